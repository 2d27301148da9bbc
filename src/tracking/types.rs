use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One detector observation
///
/// Coordinates are the center of the detected object, normalized to the
/// frame (0.0 = left/top, 1.0 = right/bottom).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// When the detection was produced (defaults to receipt time)
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_confidence() -> f64 {
    1.0
}

impl DetectionPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: 0.0,
            height: 0.0,
            confidence: 1.0,
            timestamp: Utc::now(),
        }
    }

    /// Offset from `(center_x, center_y)` in percent of the frame
    pub fn offset_pct(&self, center_x: f64, center_y: f64) -> (f64, f64) {
        (self.x * 100.0 - center_x, self.y * 100.0 - center_y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    #[default]
    Idle,
    Tracking,
}

/// Control loop state, published after every step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    pub status: TrackingStatus,
    /// Start of the last directional move
    pub last_move_at: Option<DateTime<Utc>>,
    pub cooldown_ms: u64,
    pub deadzone_pct: f64,
    /// A directional command was sent and its stop is still pending
    pub is_moving: bool,
    pub move_count: u64,
    pub last_detection: Option<DetectionPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        let point = DetectionPoint::new(0.62, 0.5);
        let (dx, dy) = point.offset_pct(50.0, 50.0);
        assert!((dx - 12.0).abs() < 1e-9);
        assert!(dy.abs() < 1e-9);
    }

    #[test]
    fn test_detection_defaults() {
        let point: DetectionPoint = serde_json::from_str(r#"{"x":0.3,"y":0.7}"#).unwrap();
        assert_eq!(point.confidence, 1.0);
        assert_eq!(point.width, 0.0);
    }
}
