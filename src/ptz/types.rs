//! PTZ motion command types

use serde::{Deserialize, Serialize};

/// Valid parameter ranges for each axis
pub mod limits {
    /// Pan/tilt drive speed range (VISCA `VV`/`WW`)
    pub const PAN_TILT_SPEED_MIN: u8 = 1;
    pub const PAN_TILT_SPEED_MAX: u8 = 24;
    /// Zoom and focus variable speed range (`p` nibble)
    pub const ZOOM_SPEED_MAX: u8 = 7;
    pub const FOCUS_SPEED_MAX: u8 = 7;
    /// Highest addressable preset slot
    pub const PRESET_SLOT_MAX: u8 = 254;
    /// Optical zoom end position
    pub const ABSOLUTE_ZOOM_MAX: u16 = 0x4000;
    /// Camera address range on a VISCA bus (0 is the controller)
    pub const CAMERA_ADDRESS_MIN: u8 = 1;
    pub const CAMERA_ADDRESS_MAX: u8 = 7;
}

/// Command axis, used for logging and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Pan,
    Tilt,
    Zoom,
    Focus,
    Preset,
    Home,
    Absolute,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Pan => "pan",
            Axis::Tilt => "tilt",
            Axis::Zoom => "zoom",
            Axis::Focus => "focus",
            Axis::Preset => "preset",
            Axis::Home => "home",
            Axis::Absolute => "absolute",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pan/tilt drive direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanTiltDirection {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    Stop,
}

impl PanTiltDirection {
    /// Build a direction from the sign of each axis (-1, 0, 1).
    ///
    /// Positive pan is right, positive tilt is down (frame coordinates).
    pub fn from_signs(pan: i8, tilt: i8) -> Self {
        match (pan.signum(), tilt.signum()) {
            (0, 0) => Self::Stop,
            (1, 0) => Self::Right,
            (-1, 0) => Self::Left,
            (0, 1) => Self::Down,
            (0, -1) => Self::Up,
            (1, 1) => Self::DownRight,
            (-1, 1) => Self::DownLeft,
            (1, -1) => Self::UpRight,
            _ => Self::UpLeft,
        }
    }

    /// Axis that this direction drives. Diagonals report `Pan`.
    pub fn axis(&self) -> Axis {
        match self {
            Self::Up | Self::Down => Axis::Tilt,
            _ => Axis::Pan,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Zoom drive direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    /// Tele
    In,
    /// Wide
    Out,
    Stop,
}

/// Focus commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusCommand {
    Near { speed: u8 },
    Far { speed: u8 },
    Stop,
    /// Switch between auto focus (`true`) and manual focus
    Auto(bool),
    /// Trigger a single auto focus pass while in manual mode
    OnePush,
}

/// Preset memory action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetAction {
    Save,
    Recall,
}

/// Symbolic motion request, encoded into a frame by [`super::visca::encode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotionCommand {
    /// Continuous pan/tilt drive (`Stop` halts both axes)
    PanTilt {
        direction: PanTiltDirection,
        pan_speed: u8,
        tilt_speed: u8,
    },
    /// Continuous zoom drive
    Zoom { direction: ZoomDirection, speed: u8 },
    Focus { command: FocusCommand },
    Preset { action: PresetAction, slot: u8 },
    Home,
    /// Move to an absolute pan/tilt position
    AbsolutePosition {
        pan_speed: u8,
        tilt_speed: u8,
        pan: u16,
        tilt: u16,
    },
    /// Move zoom to an absolute position (0 = wide end)
    AbsoluteZoom { position: u16 },
}

impl MotionCommand {
    /// Pan/tilt stop. Speeds are irrelevant for stop but must still be in range.
    pub fn stop() -> Self {
        Self::PanTilt {
            direction: PanTiltDirection::Stop,
            pan_speed: limits::PAN_TILT_SPEED_MIN,
            tilt_speed: limits::PAN_TILT_SPEED_MIN,
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Self::PanTilt { direction, .. } => direction.axis(),
            Self::Zoom { .. } | Self::AbsoluteZoom { .. } => Axis::Zoom,
            Self::Focus { .. } => Axis::Focus,
            Self::Preset { .. } => Axis::Preset,
            Self::Home => Axis::Home,
            Self::AbsolutePosition { .. } => Axis::Absolute,
        }
    }

    /// Whether this command ends continuous motion
    pub fn is_stop(&self) -> bool {
        match self {
            Self::PanTilt { direction, .. } => direction.is_stop(),
            Self::Zoom { direction, .. } => *direction == ZoomDirection::Stop,
            Self::Focus {
                command: FocusCommand::Stop,
            } => true,
            _ => false,
        }
    }
}
