use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Which collaborator an intent is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    #[serde(alias = "ptz")]
    Camera,
    #[serde(alias = "obs")]
    Switcher,
}

/// Optional intent parameters
///
/// Accepts both snake_case and the camelCase names produced by intent parsers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentParams {
    #[serde(alias = "sceneNumber", skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<u8>,
    /// "wide", "medium" or "tight"
    #[serde(alias = "zoomPreset", skip_serializing_if = "Option::is_none")]
    pub zoom_preset: Option<String>,
    /// Audio input for mute/unmute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// On/off flag (auto focus)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// A parsed command, e.g. `{"intent":"zoom_in","action":"camera"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub intent: String,
    pub action: ActionCategory,
    #[serde(default)]
    pub params: IntentParams,
}

impl Intent {
    pub fn camera(intent: &str) -> Self {
        Self {
            intent: intent.to_string(),
            action: ActionCategory::Camera,
            params: IntentParams::default(),
        }
    }

    pub fn switcher(intent: &str) -> Self {
        Self {
            intent: intent.to_string(),
            action: ActionCategory::Switcher,
            params: IntentParams::default(),
        }
    }

    pub fn with_params(mut self, params: IntentParams) -> Self {
        self.params = params;
        self
    }
}

/// Uniform outcome of one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub intent: String,
    #[serde(default)]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error kind on failure (see `AppError::kind`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl CommandResult {
    pub fn ok(intent: &str, data: Value) -> Self {
        Self {
            success: true,
            intent: intent.to_string(),
            data,
            message: None,
            error_kind: None,
        }
    }

    pub fn failed(intent: &str, error: &AppError) -> Self {
        Self {
            success: false,
            intent: intent.to_string(),
            data: Value::Null,
            message: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }
}
