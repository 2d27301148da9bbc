use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::ptz::types::limits;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// PTZ camera settings
    pub camera: CameraConfig,
    /// Production switcher connection settings
    pub switcher: SwitcherConfig,
    /// Tracking control loop settings
    pub tracking: TrackingConfig,
    /// Keyword scene rules
    pub rules: RulesConfig,
}

impl AppConfig {
    /// Check value ranges that cannot be fixed by clamping
    pub fn validate(&self) -> Result<()> {
        if self.tracking.deadzone_pct < 0.0 || self.tracking.deadzone_pct > 100.0 {
            return Err(AppError::Config(format!(
                "tracking.deadzone_pct must be within 0-100, got {}",
                self.tracking.deadzone_pct
            )));
        }
        for (name, value) in [
            ("tracking.center_x", self.tracking.center_x),
            ("tracking.center_y", self.tracking.center_y),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }
        if self.switcher.enabled && self.switcher.host.trim().is_empty() {
            return Err(AppError::Config("Switcher host not set".to_string()));
        }
        Ok(())
    }
}

/// PTZ camera configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera IP address (e.g. "192.168.1.90")
    pub address: Option<String>,
    /// VISCA-over-IP UDP port
    pub port: u16,
    /// VISCA device address (1-7)
    pub visca_address: u8,
    /// Pan drive speed (1-24)
    pub pan_speed: u8,
    /// Tilt drive speed (1-24)
    pub tilt_speed: u8,
    /// Zoom speed (0-7)
    pub zoom_speed: u8,
    /// Focus speed (0-7)
    pub focus_speed: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: crate::ptz::visca::DEFAULT_PORT,
            visca_address: limits::CAMERA_ADDRESS_MIN,
            pan_speed: 8,
            tilt_speed: 8,
            zoom_speed: 5,
            focus_speed: 3,
        }
    }
}

/// Switcher (OBS-WebSocket v5) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwitcherConfig {
    /// Connect on startup
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Only used when the server asks for authentication
    pub password: Option<String>,
    /// Handshake deadline (connect, hello, identify, identified)
    pub connect_timeout_ms: u64,
    /// Per-request response deadline
    pub request_timeout_ms: u64,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 4455,
            password: None,
            connect_timeout_ms: 5000,
            request_timeout_ms: 10000,
        }
    }
}

impl SwitcherConfig {
    /// "host:port" as shown in logs and errors
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL. A host already carrying a `ws://` scheme is used as is.
    pub fn url(&self) -> String {
        if self.host.starts_with("ws://") || self.host.starts_with("wss://") {
            self.host.clone()
        } else {
            format!("ws://{}:{}", self.host, self.port)
        }
    }
}

/// Which axis the tracker moves when the target is off center
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AxisPolicyKind {
    /// Move only the axis with the larger offset (ties go to pan)
    #[default]
    DominantAxis,
    /// Pan whenever pan is off center, tilt otherwise
    HorizontalFirst,
    /// Drive both axes together (diagonal) when both are off center
    Simultaneous,
}

/// Tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Width of the centered band, in percent of the frame
    pub deadzone_pct: f64,
    /// Minimum interval between the start of two moves
    pub cooldown_ms: u64,
    /// Drive time before the explicit stop
    pub settle_ms: u64,
    /// Desired target position, in percent of the frame
    pub center_x: f64,
    pub center_y: f64,
    pub axis_policy: AxisPolicyKind,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            deadzone_pct: 10.0,
            cooldown_ms: 300,
            settle_ms: 200,
            center_x: 50.0,
            center_y: 50.0,
            axis_policy: AxisPolicyKind::default(),
        }
    }
}

/// Scene rule engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub enabled: bool,
    /// Cooldown applied to rules that do not set their own
    pub cooldown_ms: u64,
    #[serde(rename = "rule")]
    pub list: Vec<RuleConfig>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_ms: 5000,
            list: Vec::new(),
        }
    }
}

/// One keyword rule as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Comma separated keywords
    pub keywords: String,
    pub scene: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}
