use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Connection state of a switcher client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Snapshot of what the client knows about the switcher
///
/// Written only by the owning client; everyone else reads snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitcherSession {
    pub connection_state: ConnectionState,
    pub current_scene: Option<String>,
    /// Scene names as reported by the switcher, most recently created first
    pub scene_list: Vec<String>,
    pub recording_active: bool,
    pub streaming_active: bool,
}

impl SwitcherSession {
    pub fn is_ready(&self) -> bool {
        self.connection_state == ConnectionState::Ready
    }

    /// Map a 1-based scene number to a scene name
    ///
    /// Numbers count from the oldest scene, while the list is reported newest
    /// first, so number `n` is `scene_list[len - n]`.
    pub fn scene_by_number(&self, number: usize) -> Result<&str> {
        let available = self.scene_list.len();
        if number == 0 || number > available {
            return Err(AppError::SceneOutOfRange { number, available });
        }
        Ok(&self.scene_list[available - number])
    }

    /// Whether `scene` is the current program scene
    pub fn is_current(&self, scene: &str) -> bool {
        self.current_scene.as_deref() == Some(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(scenes: &[&str]) -> SwitcherSession {
        SwitcherSession {
            scene_list: scenes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_scene_by_number() {
        let s = session(&["Intro", "Camera 2", "Camera 1"]);
        assert_eq!(s.scene_by_number(1).unwrap(), "Camera 1");
        assert_eq!(s.scene_by_number(2).unwrap(), "Camera 2");
        assert_eq!(s.scene_by_number(3).unwrap(), "Intro");
    }

    #[test]
    fn test_scene_by_number_is_bijection() {
        let s = session(&["E", "D", "C", "B", "A"]);
        let mut names: Vec<&str> = (1..=5).map(|n| s.scene_by_number(n).unwrap()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_scene_by_number_out_of_range() {
        let s = session(&["Intro", "Camera 2", "Camera 1"]);
        for n in [0, 4] {
            let err = s.scene_by_number(n).unwrap_err();
            assert!(matches!(err, AppError::SceneOutOfRange { number, available: 3 } if number == n));
            assert!(err.to_string().contains("Available: 1-3"));
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Authenticating.to_string(), "authenticating");
        assert!(!SwitcherSession::default().is_ready());
    }
}
