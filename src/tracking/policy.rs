//! Axis selection policies
//!
//! Given the offset of the target from center, a policy decides which way the
//! camera moves in one control step. Offsets are in percent of the frame;
//! positive x is right of center, positive y is below it.

use crate::config::AxisPolicyKind;
use crate::ptz::PanTiltDirection;

/// Picks the direction of one corrective move
pub trait AxisPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Direction for an off-center target. `threshold` is half the deadzone.
    /// Returns `Stop` when no axis needs to move.
    fn select(&self, offset_x: f64, offset_y: f64, threshold: f64) -> PanTiltDirection;
}

/// Slack for float rounding of `x * 100.0 - center` at the deadzone edge
const OFFSET_EPSILON: f64 = 1e-9;

fn sign(offset: f64, threshold: f64) -> i8 {
    if offset.abs() <= threshold + OFFSET_EPSILON {
        0
    } else if offset > 0.0 {
        1
    } else {
        -1
    }
}

/// Move only the axis with the larger offset; ties go to pan
#[derive(Debug, Default, Clone, Copy)]
pub struct DominantAxis;

impl AxisPolicy for DominantAxis {
    fn name(&self) -> &'static str {
        "dominant_axis"
    }

    fn select(&self, offset_x: f64, offset_y: f64, threshold: f64) -> PanTiltDirection {
        let (pan, tilt) = (sign(offset_x, threshold), sign(offset_y, threshold));
        match (pan, tilt) {
            (0, 0) => PanTiltDirection::Stop,
            (_, 0) => PanTiltDirection::from_signs(pan, 0),
            (0, _) => PanTiltDirection::from_signs(0, tilt),
            _ if offset_x.abs() >= offset_y.abs() => PanTiltDirection::from_signs(pan, 0),
            _ => PanTiltDirection::from_signs(0, tilt),
        }
    }
}

/// Pan whenever pan is off center; tilt only once pan is centered
#[derive(Debug, Default, Clone, Copy)]
pub struct HorizontalFirst;

impl AxisPolicy for HorizontalFirst {
    fn name(&self) -> &'static str {
        "horizontal_first"
    }

    fn select(&self, offset_x: f64, offset_y: f64, threshold: f64) -> PanTiltDirection {
        match sign(offset_x, threshold) {
            0 => PanTiltDirection::from_signs(0, sign(offset_y, threshold)),
            pan => PanTiltDirection::from_signs(pan, 0),
        }
    }
}

/// Drive every off-center axis at once (diagonals allowed)
#[derive(Debug, Default, Clone, Copy)]
pub struct Simultaneous;

impl AxisPolicy for Simultaneous {
    fn name(&self) -> &'static str {
        "simultaneous"
    }

    fn select(&self, offset_x: f64, offset_y: f64, threshold: f64) -> PanTiltDirection {
        PanTiltDirection::from_signs(sign(offset_x, threshold), sign(offset_y, threshold))
    }
}

/// Build the policy named in configuration
pub fn from_kind(kind: AxisPolicyKind) -> Box<dyn AxisPolicy> {
    match kind {
        AxisPolicyKind::DominantAxis => Box::new(DominantAxis),
        AxisPolicyKind::HorizontalFirst => Box::new(HorizontalFirst),
        AxisPolicyKind::Simultaneous => Box::new(Simultaneous),
    }
}
