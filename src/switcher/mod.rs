//! Production switcher control
//!
//! Speaks the OBS-WebSocket v5 protocol over one persistent connection.
//! The rule engine and the command dispatcher talk to the switcher through the
//! [`Switcher`] trait, so they can be driven by a fake in tests.

pub mod auth;
pub mod client;
pub mod protocol;
pub mod session;

pub use client::SwitcherClient;
pub use session::{ConnectionState, SwitcherSession};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Switcher operations used by the rule engine and the dispatcher
///
/// Output and scene operations return `Ok(false)` when no state change was
/// needed and no request was sent.
#[async_trait]
pub trait Switcher: Send + Sync {
    /// Latest session snapshot
    fn session(&self) -> Arc<SwitcherSession>;

    fn is_ready(&self) -> bool {
        self.session().is_ready()
    }

    async fn switch_scene(&self, scene: &str) -> Result<bool>;

    async fn switch_scene_by_number(&self, number: usize) -> Result<bool>;

    async fn start_recording(&self) -> Result<bool>;

    async fn stop_recording(&self) -> Result<bool>;

    async fn start_streaming(&self) -> Result<bool>;

    async fn stop_streaming(&self) -> Result<bool>;

    async fn set_input_mute(&self, input: &str, muted: bool) -> Result<()>;

    async fn set_source_visible(&self, scene: &str, source: &str, visible: bool) -> Result<()>;
}

#[async_trait]
impl Switcher for SwitcherClient {
    fn session(&self) -> Arc<SwitcherSession> {
        SwitcherClient::session(self)
    }

    async fn switch_scene(&self, scene: &str) -> Result<bool> {
        SwitcherClient::switch_scene(self, scene).await
    }

    async fn switch_scene_by_number(&self, number: usize) -> Result<bool> {
        SwitcherClient::switch_scene_by_number(self, number).await
    }

    async fn start_recording(&self) -> Result<bool> {
        SwitcherClient::start_recording(self).await
    }

    async fn stop_recording(&self) -> Result<bool> {
        SwitcherClient::stop_recording(self).await
    }

    async fn start_streaming(&self) -> Result<bool> {
        SwitcherClient::start_streaming(self).await
    }

    async fn stop_streaming(&self) -> Result<bool> {
        SwitcherClient::stop_streaming(self).await
    }

    async fn set_input_mute(&self, input: &str, muted: bool) -> Result<()> {
        SwitcherClient::set_input_mute(self, input, muted).await
    }

    async fn set_source_visible(&self, scene: &str, source: &str, visible: bool) -> Result<()> {
        SwitcherClient::set_source_visible(self, scene, source, visible).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory switcher for rule engine and dispatcher tests

    use super::*;
    use crate::error::AppError;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeSwitcher {
        pub session: Mutex<SwitcherSession>,
        /// Operations that reached the "server", in order
        pub calls: Mutex<Vec<String>>,
        /// Make scene switches fail with `RequestFailed`
        pub fail_switch: Mutex<bool>,
    }

    impl FakeSwitcher {
        /// Ready switcher with `["Intro", "Camera 2", "Camera 1"]`, on "Camera 1"
        pub fn ready() -> Arc<Self> {
            let fake = Self::default();
            *fake.session.lock() = SwitcherSession {
                connection_state: ConnectionState::Ready,
                current_scene: Some("Camera 1".to_string()),
                scene_list: vec![
                    "Intro".to_string(),
                    "Camera 2".to_string(),
                    "Camera 1".to_string(),
                ],
                recording_active: false,
                streaming_active: false,
            };
            Arc::new(fake)
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn check_ready(&self) -> Result<()> {
            if self.session.lock().is_ready() {
                Ok(())
            } else {
                Err(AppError::NotConnected)
            }
        }

        fn set_output(&self, name: &str, record: bool, active: bool) -> Result<bool> {
            self.check_ready()?;
            let mut session = self.session.lock();
            let flag = if record {
                &mut session.recording_active
            } else {
                &mut session.streaming_active
            };
            if *flag == active {
                return Ok(false);
            }
            *flag = active;
            self.calls.lock().push(name.to_string());
            Ok(true)
        }
    }

    #[async_trait]
    impl Switcher for FakeSwitcher {
        fn session(&self) -> Arc<SwitcherSession> {
            Arc::new(self.session.lock().clone())
        }

        async fn switch_scene(&self, scene: &str) -> Result<bool> {
            self.check_ready()?;
            if self.session.lock().is_current(scene) {
                return Ok(false);
            }
            if *self.fail_switch.lock() {
                return Err(AppError::RequestFailed {
                    request_type: "SetCurrentProgramScene".to_string(),
                    comment: "No source was found".to_string(),
                });
            }
            self.session.lock().current_scene = Some(scene.to_string());
            self.calls.lock().push(format!("switch:{}", scene));
            Ok(true)
        }

        async fn switch_scene_by_number(&self, number: usize) -> Result<bool> {
            self.check_ready()?;
            let scene = self.session.lock().scene_by_number(number)?.to_string();
            self.switch_scene(&scene).await
        }

        async fn start_recording(&self) -> Result<bool> {
            self.set_output("StartRecord", true, true)
        }

        async fn stop_recording(&self) -> Result<bool> {
            self.set_output("StopRecord", true, false)
        }

        async fn start_streaming(&self) -> Result<bool> {
            self.set_output("StartStream", false, true)
        }

        async fn stop_streaming(&self) -> Result<bool> {
            self.set_output("StopStream", false, false)
        }

        async fn set_input_mute(&self, input: &str, muted: bool) -> Result<()> {
            self.check_ready()?;
            self.calls.lock().push(format!("mute:{}:{}", input, muted));
            Ok(())
        }

        async fn set_source_visible(&self, scene: &str, source: &str, visible: bool) -> Result<()> {
            self.check_ready()?;
            self.calls
                .lock()
                .push(format!("visible:{}:{}:{}", scene, source, visible));
            Ok(())
        }
    }
}
