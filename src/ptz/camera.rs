//! PTZ camera facade
//!
//! High-level camera operations on top of the VISCA encoder and a frame
//! transport. This is the boundary where camera transport failures stop: they
//! are logged (throttled per camera), published as
//! [`SystemEvent::CameraTransportError`] and reported to the caller as
//! `Ok(false)`. The only error that propagates is a missing camera address.

use parking_lot::RwLock;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

use super::transport::FrameTransport;
use super::types::{FocusCommand, MotionCommand, PanTiltDirection, PresetAction, ZoomDirection};
use super::visca;
use crate::config::CameraConfig;
use crate::error::{AppError, Result};
use crate::events::{EventBus, SystemEvent};
use crate::utils::LogThrottler;

/// Runtime camera settings
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Camera UDP endpoint, `None` until configured
    pub target: Option<SocketAddr>,
    /// VISCA device address (1-7)
    pub visca_address: u8,
    pub pan_speed: u8,
    pub tilt_speed: u8,
    pub zoom_speed: u8,
    pub focus_speed: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            target: None,
            visca_address: 1,
            pan_speed: 8,
            tilt_speed: 8,
            zoom_speed: 5,
            focus_speed: 3,
        }
    }
}

impl CameraSettings {
    /// Build settings from configuration, parsing the camera address
    pub fn from_config(config: &CameraConfig) -> Result<Self> {
        let target = match config.address.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(addr) => {
                let ip: IpAddr = addr.parse().map_err(|_| {
                    AppError::Config(format!("Invalid camera address: {}", addr))
                })?;
                Some(SocketAddr::new(ip, config.port))
            }
        };

        Ok(Self {
            target,
            visca_address: config.visca_address,
            pan_speed: config.pan_speed,
            tilt_speed: config.tilt_speed,
            zoom_speed: config.zoom_speed,
            focus_speed: config.focus_speed,
        })
    }
}

/// PTZ camera controller
pub struct PtzCamera {
    transport: Arc<dyn FrameTransport>,
    settings: RwLock<CameraSettings>,
    events: Arc<EventBus>,
    throttler: LogThrottler,
}

impl PtzCamera {
    pub fn new(
        transport: Arc<dyn FrameTransport>,
        settings: CameraSettings,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            transport,
            settings: RwLock::new(settings),
            events,
            throttler: LogThrottler::default(),
        }
    }

    /// Current settings snapshot
    pub fn settings(&self) -> CameraSettings {
        self.settings.read().clone()
    }

    /// Replace settings (hot reload)
    pub fn update_settings(&self, settings: CameraSettings) {
        *self.settings.write() = settings;
    }

    pub fn set_target(&self, target: Option<SocketAddr>) {
        self.settings.write().target = target;
    }

    pub fn target(&self) -> Option<SocketAddr> {
        self.settings.read().target
    }

    /// Encode and send a command
    ///
    /// Returns `Ok(true)` if the frame was handed to the network, `Ok(false)` if
    /// the transport failed, and `Err(AppError::Config)` if no camera address is
    /// set.
    pub async fn execute(&self, command: MotionCommand) -> Result<bool> {
        let (target, address) = {
            let settings = self.settings.read();
            (settings.target, settings.visca_address)
        };
        let target = target
            .ok_or_else(|| AppError::Config("Camera address not set".to_string()))?;

        let frame = visca::encode(address, &command);
        debug!("PTZ {} -> {}: {:?}", command.axis(), target, frame);

        let key = target.to_string();
        match self.transport.send_frame(target, frame.as_bytes()).await {
            Ok(()) => {
                self.throttler.clear(&key);
                Ok(true)
            }
            Err(e) => {
                crate::warn_throttled!(
                    self.throttler,
                    &key,
                    "PTZ {} command to {} failed ({}): {}",
                    command.axis(),
                    target,
                    self.transport.name(),
                    e
                );
                self.events.publish(SystemEvent::CameraTransportError {
                    target: key,
                    axis: command.axis().to_string(),
                    reason: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Drive pan/tilt in `direction` at the configured speeds
    pub async fn drive(&self, direction: PanTiltDirection) -> Result<bool> {
        let (pan_speed, tilt_speed) = {
            let settings = self.settings.read();
            (settings.pan_speed, settings.tilt_speed)
        };
        self.execute(MotionCommand::PanTilt {
            direction,
            pan_speed,
            tilt_speed,
        })
        .await
    }

    /// Stop pan/tilt motion
    pub async fn stop(&self) -> Result<bool> {
        self.drive(PanTiltDirection::Stop).await
    }

    pub async fn pan_left(&self) -> Result<bool> {
        self.drive(PanTiltDirection::Left).await
    }

    pub async fn pan_right(&self) -> Result<bool> {
        self.drive(PanTiltDirection::Right).await
    }

    pub async fn tilt_up(&self) -> Result<bool> {
        self.drive(PanTiltDirection::Up).await
    }

    pub async fn tilt_down(&self) -> Result<bool> {
        self.drive(PanTiltDirection::Down).await
    }

    /// Drive zoom at the configured zoom speed
    pub async fn zoom(&self, direction: ZoomDirection) -> Result<bool> {
        let speed = self.settings.read().zoom_speed;
        self.execute(MotionCommand::Zoom { direction, speed }).await
    }

    pub async fn zoom_in(&self) -> Result<bool> {
        self.zoom(ZoomDirection::In).await
    }

    pub async fn zoom_out(&self) -> Result<bool> {
        self.zoom(ZoomDirection::Out).await
    }

    pub async fn zoom_stop(&self) -> Result<bool> {
        self.zoom(ZoomDirection::Stop).await
    }

    /// Move zoom to an absolute position (0 = wide end, clamped to 0x4000)
    pub async fn set_zoom_position(&self, position: u16) -> Result<bool> {
        self.execute(MotionCommand::AbsoluteZoom { position }).await
    }

    /// Move to an absolute pan/tilt position at the configured speeds
    pub async fn move_to(&self, pan: u16, tilt: u16) -> Result<bool> {
        let (pan_speed, tilt_speed) = {
            let settings = self.settings.read();
            (settings.pan_speed, settings.tilt_speed)
        };
        self.execute(MotionCommand::AbsolutePosition {
            pan_speed,
            tilt_speed,
            pan,
            tilt,
        })
        .await
    }

    pub async fn focus_near(&self) -> Result<bool> {
        let speed = self.settings.read().focus_speed;
        self.execute(MotionCommand::Focus {
            command: FocusCommand::Near { speed },
        })
        .await
    }

    pub async fn focus_far(&self) -> Result<bool> {
        let speed = self.settings.read().focus_speed;
        self.execute(MotionCommand::Focus {
            command: FocusCommand::Far { speed },
        })
        .await
    }

    pub async fn focus_stop(&self) -> Result<bool> {
        self.execute(MotionCommand::Focus {
            command: FocusCommand::Stop,
        })
        .await
    }

    pub async fn set_auto_focus(&self, enabled: bool) -> Result<bool> {
        self.execute(MotionCommand::Focus {
            command: FocusCommand::Auto(enabled),
        })
        .await
    }

    pub async fn one_push_focus(&self) -> Result<bool> {
        self.execute(MotionCommand::Focus {
            command: FocusCommand::OnePush,
        })
        .await
    }

    pub async fn home(&self) -> Result<bool> {
        self.execute(MotionCommand::Home).await
    }

    pub async fn recall_preset(&self, slot: u8) -> Result<bool> {
        self.execute(MotionCommand::Preset {
            action: PresetAction::Recall,
            slot,
        })
        .await
    }

    pub async fn save_preset(&self, slot: u8) -> Result<bool> {
        if slot > super::types::limits::PRESET_SLOT_MAX {
            warn!("Preset slot {} clamped to {}", slot, super::types::limits::PRESET_SLOT_MAX);
        }
        self.execute(MotionCommand::Preset {
            action: PresetAction::Save,
            slot,
        })
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_pan_right_uses_configured_speed() {
        let (camera, transport, _) = recording_camera();

        assert!(camera.pan_right().await.unwrap());
        assert_eq!(
            transport.frames(),
            vec![vec![0x81, 0x01, 0x06, 0x01, 0x05, 0x05, 0x02, 0x03, 0xFF]]
        );
    }

    #[tokio::test]
    async fn test_missing_target_is_configuration_error() {
        let transport = Arc::new(RecordingTransport::default());
        let camera = PtzCamera::new(
            transport.clone(),
            CameraSettings::default(),
            Arc::new(EventBus::new()),
        );

        let err = camera.home().await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(transport.frames().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let (camera, transport, events) = recording_camera();
        let mut rx = events.subscribe();
        transport.set_failing(true);

        assert!(!camera.tilt_up().await.unwrap());

        match rx.recv().await.unwrap() {
            SystemEvent::CameraTransportError { target, axis, .. } => {
                assert_eq!(target, "10.0.0.9:1259");
                assert_eq!(axis, "tilt");
            }
            other => panic!("unexpected event {:?}", other),
        }

        transport.set_failing(false);
        assert!(camera.tilt_up().await.unwrap());
    }

    #[test]
    fn test_settings_from_config() {
        let config = CameraConfig {
            address: Some("192.168.1.90".to_string()),
            port: 52381,
            ..Default::default()
        };
        let settings = CameraSettings::from_config(&config).unwrap();
        assert_eq!(settings.target, Some("192.168.1.90:52381".parse().unwrap()));

        let config = CameraConfig {
            address: Some("not-an-ip".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CameraSettings::from_config(&config),
            Err(AppError::Config(_))
        ));

        let config = CameraConfig::default();
        assert_eq!(CameraSettings::from_config(&config).unwrap().target, None);
    }
}
