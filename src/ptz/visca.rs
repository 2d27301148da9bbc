//! VISCA command frame encoder
//!
//! ## Frame Format
//! ```text
//! ┌────────┬──────┬──────────┬─────────┬──────────────┬──────┐
//! │ Header │ Type │ Category │ Command │  Parameters  │ Term │
//! ├────────┼──────┼──────────┼─────────┼──────────────┼──────┤
//! │ 8x     │ 01   │ 04 / 06  │ xx      │ 0..10 bytes  │ FF   │
//! └────────┴──────┴──────────┴─────────┴──────────────┴──────┘
//! ```
//!
//! The header carries the receiving camera address in its low nibble
//! (`0x80 | address`). Category `0x04` is the camera block (zoom, focus,
//! presets), `0x06` is the pan/tilt block. 16-bit positions are sent as four
//! bytes holding one nibble each, most significant first.
//!
//! Encoding is total. Parameters outside the documented range are clamped
//! instead of rejected.

use super::types::{
    limits, FocusCommand, MotionCommand, PanTiltDirection, PresetAction, ZoomDirection,
};

/// Frame terminator
const TERMINATOR: u8 = 0xFF;

/// Message type: command
const TYPE_COMMAND: u8 = 0x01;

/// Longest frame (absolute pan/tilt: 6 fixed bytes + 8 nibbles + terminator)
pub const MAX_FRAME_LEN: usize = 15;

/// Default VISCA-over-IP UDP port
pub const DEFAULT_PORT: u16 = 1259;

/// Command categories and codes
#[allow(dead_code)]
pub mod cmd {
    /// Camera block
    pub const CATEGORY_CAMERA: u8 = 0x04;
    /// Pan/tilt block
    pub const CATEGORY_PAN_TILT: u8 = 0x06;

    pub const ZOOM: u8 = 0x07;
    pub const ZOOM_DIRECT: u8 = 0x47;
    pub const FOCUS: u8 = 0x08;
    pub const FOCUS_MODE: u8 = 0x38;
    pub const FOCUS_ONE_PUSH: u8 = 0x18;
    pub const MEMORY: u8 = 0x3F;

    pub const PAN_TILT_DRIVE: u8 = 0x01;
    pub const PAN_TILT_ABSOLUTE: u8 = 0x02;
    pub const PAN_TILT_HOME: u8 = 0x04;
}

/// Encoded VISCA frame in a stack buffer
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    fn build(address: u8, category: u8, command: u8, params: &[u8]) -> Self {
        debug_assert!(params.len() + 5 <= MAX_FRAME_LEN, "VISCA frame too long");

        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[0] = 0x80 | clamp_address(address);
        buf[1] = TYPE_COMMAND;
        buf[2] = category;
        buf[3] = command;
        buf[4..4 + params.len()].copy_from_slice(params);
        buf[4 + params.len()] = TERMINATOR;

        Self {
            buf,
            len: 5 + params.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X?}", self.as_bytes())
    }
}

#[inline]
fn clamp_address(address: u8) -> u8 {
    address.clamp(limits::CAMERA_ADDRESS_MIN, limits::CAMERA_ADDRESS_MAX)
}

/// Clamp a pan/tilt drive speed to 1..=24
#[inline]
pub fn clamp_pan_tilt_speed(speed: u8) -> u8 {
    speed.clamp(limits::PAN_TILT_SPEED_MIN, limits::PAN_TILT_SPEED_MAX)
}

/// Clamp a zoom/focus variable speed to 0..=7
#[inline]
pub fn clamp_variable_speed(speed: u8) -> u8 {
    speed.min(limits::ZOOM_SPEED_MAX)
}

/// Clamp a preset slot to 0..=254
#[inline]
pub fn clamp_preset_slot(slot: u8) -> u8 {
    slot.min(limits::PRESET_SLOT_MAX)
}

/// Split a 16-bit value into four nibble bytes, most significant first
#[inline]
fn nibbles(value: u16) -> [u8; 4] {
    [
        ((value >> 12) & 0x0F) as u8,
        ((value >> 8) & 0x0F) as u8,
        ((value >> 4) & 0x0F) as u8,
        (value & 0x0F) as u8,
    ]
}

/// Pan and tilt direction bytes (01 = left/up, 02 = right/down, 03 = stop)
fn direction_bytes(direction: PanTiltDirection) -> (u8, u8) {
    match direction {
        PanTiltDirection::Up => (0x03, 0x01),
        PanTiltDirection::Down => (0x03, 0x02),
        PanTiltDirection::Left => (0x01, 0x03),
        PanTiltDirection::Right => (0x02, 0x03),
        PanTiltDirection::UpLeft => (0x01, 0x01),
        PanTiltDirection::UpRight => (0x02, 0x01),
        PanTiltDirection::DownLeft => (0x01, 0x02),
        PanTiltDirection::DownRight => (0x02, 0x02),
        PanTiltDirection::Stop => (0x03, 0x03),
    }
}

/// Encode a motion command for the camera at `address` (1-7)
pub fn encode(address: u8, command: &MotionCommand) -> Frame {
    match *command {
        MotionCommand::PanTilt {
            direction,
            pan_speed,
            tilt_speed,
        } => {
            let (pan, tilt) = direction_bytes(direction);
            Frame::build(
                address,
                cmd::CATEGORY_PAN_TILT,
                cmd::PAN_TILT_DRIVE,
                &[
                    clamp_pan_tilt_speed(pan_speed),
                    clamp_pan_tilt_speed(tilt_speed),
                    pan,
                    tilt,
                ],
            )
        }
        MotionCommand::Zoom { direction, speed } => {
            let s = clamp_variable_speed(speed);
            let param = match direction {
                ZoomDirection::In => 0x20 | s,
                ZoomDirection::Out => 0x30 | s,
                ZoomDirection::Stop => 0x00,
            };
            Frame::build(address, cmd::CATEGORY_CAMERA, cmd::ZOOM, &[param])
        }
        MotionCommand::Focus { command } => encode_focus(address, command),
        MotionCommand::Preset { action, slot } => {
            let action = match action {
                PresetAction::Save => 0x01,
                PresetAction::Recall => 0x02,
            };
            Frame::build(
                address,
                cmd::CATEGORY_CAMERA,
                cmd::MEMORY,
                &[action, clamp_preset_slot(slot)],
            )
        }
        MotionCommand::Home => {
            Frame::build(address, cmd::CATEGORY_PAN_TILT, cmd::PAN_TILT_HOME, &[])
        }
        MotionCommand::AbsolutePosition {
            pan_speed,
            tilt_speed,
            pan,
            tilt,
        } => {
            let mut params = [0u8; 10];
            params[0] = clamp_pan_tilt_speed(pan_speed);
            params[1] = clamp_pan_tilt_speed(tilt_speed);
            params[2..6].copy_from_slice(&nibbles(pan));
            params[6..10].copy_from_slice(&nibbles(tilt));
            Frame::build(
                address,
                cmd::CATEGORY_PAN_TILT,
                cmd::PAN_TILT_ABSOLUTE,
                &params,
            )
        }
        MotionCommand::AbsoluteZoom { position } => Frame::build(
            address,
            cmd::CATEGORY_CAMERA,
            cmd::ZOOM_DIRECT,
            &nibbles(position.min(limits::ABSOLUTE_ZOOM_MAX)),
        ),
    }
}

/// Standard VISCA mapping: far is `0x2p`, near is `0x3p`. Some controllers
/// send these two swapped.
fn encode_focus(address: u8, command: FocusCommand) -> Frame {
    match command {
        FocusCommand::Far { speed } => Frame::build(
            address,
            cmd::CATEGORY_CAMERA,
            cmd::FOCUS,
            &[0x20 | speed.min(limits::FOCUS_SPEED_MAX)],
        ),
        FocusCommand::Near { speed } => Frame::build(
            address,
            cmd::CATEGORY_CAMERA,
            cmd::FOCUS,
            &[0x30 | speed.min(limits::FOCUS_SPEED_MAX)],
        ),
        FocusCommand::Stop => Frame::build(address, cmd::CATEGORY_CAMERA, cmd::FOCUS, &[0x00]),
        FocusCommand::Auto(enabled) => Frame::build(
            address,
            cmd::CATEGORY_CAMERA,
            cmd::FOCUS_MODE,
            &[if enabled { 0x02 } else { 0x03 }],
        ),
        FocusCommand::OnePush => Frame::build(
            address,
            cmd::CATEGORY_CAMERA,
            cmd::FOCUS_ONE_PUSH,
            &[0x01],
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
