//! Intent dispatch
//!
//! Routes a parsed intent to the camera or the switcher and reports the outcome
//! as a [`CommandResult`]. Momentary camera intents ("pan left", "zoom in")
//! drive for a fixed time and then stop.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::types::{ActionCategory, CommandResult, Intent};
use crate::error::{AppError, Result};
use crate::events::{EventBus, SystemEvent};
use crate::ptz::PtzCamera;
use crate::switcher::Switcher;
use crate::tracking::TrackingService;

/// Drive time of a momentary zoom
const MOMENTARY_ZOOM: Duration = Duration::from_millis(500);
/// Drive time of a momentary pan, tilt or focus
const MOMENTARY_MOVE: Duration = Duration::from_millis(300);

/// Absolute zoom position of a named zoom preset
fn zoom_preset_position(name: &str) -> Option<u16> {
    match name {
        "wide" => Some(0),
        "medium" => Some(4000),
        "tight" => Some(10000),
        _ => None,
    }
}

pub struct CommandDispatcher {
    camera: Option<Arc<PtzCamera>>,
    tracking: Option<Arc<TrackingService>>,
    switcher: Option<Arc<dyn Switcher>>,
    events: Arc<EventBus>,
}

impl CommandDispatcher {
    pub fn new(
        camera: Option<Arc<PtzCamera>>,
        tracking: Option<Arc<TrackingService>>,
        switcher: Option<Arc<dyn Switcher>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            camera,
            tracking,
            switcher,
            events,
        }
    }

    /// Execute an intent and report the outcome
    ///
    /// Publishes `CommandExecuted` or `CommandFailed`.
    pub async fn execute(&self, intent: &Intent) -> CommandResult {
        info!("Executing {} ({:?})", intent.intent, intent.action);

        match self.try_execute(intent).await {
            Ok(data) => {
                self.events.publish(SystemEvent::CommandExecuted {
                    intent: intent.intent.clone(),
                    result: data.clone(),
                });
                CommandResult::ok(&intent.intent, data)
            }
            Err(e) => {
                warn!("Intent {} failed: {}", intent.intent, e);
                self.events.publish(SystemEvent::CommandFailed {
                    intent: intent.intent.clone(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
                CommandResult::failed(&intent.intent, &e)
            }
        }
    }

    /// Execute an intent, returning its result data or a typed error
    pub async fn try_execute(&self, intent: &Intent) -> Result<Value> {
        match intent.action {
            ActionCategory::Camera => self.execute_camera(intent).await,
            ActionCategory::Switcher => self.execute_switcher(intent).await,
        }
    }

    fn camera(&self) -> Result<&PtzCamera> {
        self.camera
            .as_deref()
            .ok_or_else(|| AppError::Config("Camera not configured".to_string()))
    }

    fn tracking(&self) -> Result<&TrackingService> {
        self.tracking
            .as_deref()
            .ok_or_else(|| AppError::Config("Tracking not available".to_string()))
    }

    fn switcher(&self) -> Result<&dyn Switcher> {
        match self.switcher.as_deref() {
            Some(switcher) if switcher.is_ready() => Ok(switcher),
            _ => Err(AppError::NotConnected),
        }
    }

    async fn execute_camera(&self, intent: &Intent) -> Result<Value> {
        let params = &intent.params;

        match intent.intent.as_str() {
            "tracking_start" => {
                self.tracking()?.start();
                Ok(json!({ "tracking": true }))
            }
            "tracking_stop" => {
                self.tracking()?.stop().await;
                self.camera()?.stop().await?;
                Ok(json!({ "tracking": false }))
            }
            "zoom_in" | "zoom_out" => {
                let camera = self.camera()?;
                let zoom_in = intent.intent == "zoom_in";
                if zoom_in {
                    camera.zoom_in().await?;
                } else {
                    camera.zoom_out().await?;
                }
                tokio::time::sleep(MOMENTARY_ZOOM).await;
                camera.zoom_stop().await?;
                Ok(json!({ "zoomed": if zoom_in { "in" } else { "out" } }))
            }
            "zoom_preset" => {
                let name = params.zoom_preset.as_deref().unwrap_or("wide");
                let position = zoom_preset_position(name).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Unknown zoom preset '{}' (wide, medium, tight)",
                        name
                    ))
                })?;
                self.camera()?.set_zoom_position(position).await?;
                Ok(json!({ "zoom_preset": name, "position": position }))
            }
            "pan_left" | "pan_right" | "tilt_up" | "tilt_down" => {
                let camera = self.camera()?;
                match intent.intent.as_str() {
                    "pan_left" => camera.pan_left().await?,
                    "pan_right" => camera.pan_right().await?,
                    "tilt_up" => camera.tilt_up().await?,
                    _ => camera.tilt_down().await?,
                };
                tokio::time::sleep(MOMENTARY_MOVE).await;
                camera.stop().await?;
                Ok(match intent.intent.as_str() {
                    "pan_left" => json!({ "panned": "left" }),
                    "pan_right" => json!({ "panned": "right" }),
                    "tilt_up" => json!({ "tilted": "up" }),
                    _ => json!({ "tilted": "down" }),
                })
            }
            "focus_near" | "focus_far" => {
                let camera = self.camera()?;
                let near = intent.intent == "focus_near";
                if near {
                    camera.focus_near().await?;
                } else {
                    camera.focus_far().await?;
                }
                tokio::time::sleep(MOMENTARY_MOVE).await;
                camera.focus_stop().await?;
                Ok(json!({ "focused": if near { "near" } else { "far" } }))
            }
            "auto_focus" => {
                let enabled = params.enabled.unwrap_or(true);
                self.camera()?.set_auto_focus(enabled).await?;
                Ok(json!({ "auto_focus": enabled }))
            }
            "stop" => {
                self.camera()?.stop().await?;
                Ok(json!({ "stopped": true }))
            }
            "home" => {
                self.camera()?.home().await?;
                Ok(json!({ "home": true }))
            }
            "goto_preset" | "save_preset" => {
                let slot = params
                    .preset
                    .ok_or_else(|| AppError::BadRequest("No preset specified".to_string()))?;
                let camera = self.camera()?;
                if intent.intent == "goto_preset" {
                    camera.recall_preset(slot).await?;
                    Ok(json!({ "preset": slot }))
                } else {
                    camera.save_preset(slot).await?;
                    Ok(json!({ "saved_preset": slot }))
                }
            }
            other => Err(AppError::UnknownIntent(format!("camera/{}", other))),
        }
    }

    async fn execute_switcher(&self, intent: &Intent) -> Result<Value> {
        let params = &intent.params;
        let name = intent.intent.as_str();

        if !matches!(
            name,
            "switch_scene"
                | "switch_camera"
                | "start_recording"
                | "stop_recording"
                | "start_streaming"
                | "stop_streaming"
                | "mute"
                | "unmute"
        ) {
            return Err(AppError::UnknownIntent(format!("switcher/{}", name)));
        }
        let switcher = self.switcher()?;

        match name {
            "switch_scene" | "switch_camera" => {
                if let Some(number) = params.scene_number {
                    let changed = switcher.switch_scene_by_number(number).await?;
                    Ok(json!({ "scene": number, "changed": changed }))
                } else if let Some(scene) = params.scene.as_deref() {
                    let changed = switcher.switch_scene(scene).await?;
                    Ok(json!({ "scene": scene, "changed": changed }))
                } else {
                    Err(AppError::BadRequest("No scene specified".to_string()))
                }
            }
            "start_recording" => {
                let changed = switcher.start_recording().await?;
                Ok(json!({ "recording": true, "changed": changed }))
            }
            "stop_recording" => {
                let changed = switcher.stop_recording().await?;
                Ok(json!({ "recording": false, "changed": changed }))
            }
            "start_streaming" => {
                let changed = switcher.start_streaming().await?;
                Ok(json!({ "streaming": true, "changed": changed }))
            }
            "stop_streaming" => {
                let changed = switcher.stop_streaming().await?;
                Ok(json!({ "streaming": false, "changed": changed }))
            }
            _ => {
                let muted = name == "mute";
                let source = params
                    .source
                    .as_deref()
                    .ok_or_else(|| AppError::BadRequest("No source specified".to_string()))?;
                switcher.set_input_mute(source, muted).await?;
                Ok(json!({ "muted": muted, "source": source }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::IntentParams;
    use crate::ptz::camera::testing::{drive_frame, recording_camera, RecordingTransport};
    use crate::ptz::{visca, MotionCommand, PanTiltDirection, ZoomDirection};
    use crate::switcher::testing::FakeSwitcher;
    use crate::switcher::ConnectionState;

    fn dispatcher(
        switcher: Option<Arc<FakeSwitcher>>,
    ) -> (CommandDispatcher, Arc<RecordingTransport>, Arc<EventBus>) {
        let (camera, transport, events) = recording_camera();
        let switcher = switcher.map(|s| s as Arc<dyn Switcher>);
        (
            CommandDispatcher::new(Some(camera), None, switcher, events.clone()),
            transport,
            events,
        )
    }

    fn zoom_frame(direction: ZoomDirection) -> Vec<u8> {
        visca::encode(1, &MotionCommand::Zoom { direction, speed: 5 })
            .as_bytes()
            .to_vec()
    }

    #[tokio::test(start_paused = true)]
    async fn test_momentary_pan() {
        let (dispatcher, transport, _) = dispatcher(None);
        let start = tokio::time::Instant::now();

        let result = dispatcher.execute(&Intent::camera("pan_left")).await;

        assert!(result.success);
        assert_eq!(result.data, json!({ "panned": "left" }));
        assert!(start.elapsed() >= MOMENTARY_MOVE);
        assert_eq!(
            transport.frames(),
            vec![
                drive_frame(PanTiltDirection::Left),
                drive_frame(PanTiltDirection::Stop)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_momentary_zoom() {
        let (dispatcher, transport, _) = dispatcher(None);
        let start = tokio::time::Instant::now();

        let result = dispatcher.execute(&Intent::camera("zoom_in")).await;

        assert!(result.success);
        assert!(start.elapsed() >= MOMENTARY_ZOOM);
        assert_eq!(
            transport.frames(),
            vec![zoom_frame(ZoomDirection::In), zoom_frame(ZoomDirection::Stop)]
        );
    }

    #[tokio::test]
    async fn test_zoom_preset() {
        let (dispatcher, transport, _) = dispatcher(None);
        let intent = Intent::camera("zoom_preset").with_params(IntentParams {
            zoom_preset: Some("medium".to_string()),
            ..Default::default()
        });

        let result = dispatcher.execute(&intent).await;
        assert!(result.success);
        // 4000 = 0x0FA0
        assert_eq!(
            transport.frames(),
            vec![vec![0x81, 0x01, 0x04, 0x47, 0x00, 0x0F, 0x0A, 0x00, 0xFF]]
        );

        let intent = Intent::camera("zoom_preset").with_params(IntentParams {
            zoom_preset: Some("ultra".to_string()),
            ..Default::default()
        });
        let result = dispatcher.execute(&intent).await;
        assert_eq!(result.error_kind.as_deref(), Some("bad_request"));
    }

    #[tokio::test]
    async fn test_goto_preset_requires_slot() {
        let (dispatcher, transport, _) = dispatcher(None);

        let result = dispatcher.execute(&Intent::camera("goto_preset")).await;
        assert!(!result.success);
        assert!(transport.frames().is_empty());

        let intent = Intent::camera("goto_preset").with_params(IntentParams {
            preset: Some(3),
            ..Default::default()
        });
        assert!(dispatcher.execute(&intent).await.success);
        assert_eq!(
            transport.frames(),
            vec![vec![0x81, 0x01, 0x04, 0x3F, 0x02, 0x03, 0xFF]]
        );
    }

    #[tokio::test]
    async fn test_unknown_intent() {
        let (dispatcher, _, events) = dispatcher(Some(FakeSwitcher::ready()));
        let mut rx = events.subscribe();

        let result = dispatcher.execute(&Intent::camera("barrel_roll")).await;
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("unknown_intent"));

        match rx.recv().await.unwrap() {
            SystemEvent::CommandFailed { intent, kind, .. } => {
                assert_eq!(intent, "barrel_roll");
                assert_eq!(kind, "unknown_intent");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = dispatcher
            .try_execute(&Intent::switcher("zoom_in"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownIntent(_)));
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        let events = Arc::new(EventBus::new());
        let dispatcher = CommandDispatcher::new(None, None, None, events);

        let err = dispatcher
            .try_execute(&Intent::camera("home"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = dispatcher
            .try_execute(&Intent::camera("tracking_start"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = dispatcher
            .try_execute(&Intent::switcher("start_recording"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotConnected));
    }

    #[tokio::test]
    async fn test_switch_scene_by_number() {
        let switcher = FakeSwitcher::ready();
        let (dispatcher, _, events) = dispatcher(Some(switcher.clone()));
        let mut rx = events.subscribe();

        let intent = Intent::switcher("switch_camera").with_params(IntentParams {
            scene_number: Some(2),
            ..Default::default()
        });
        let result = dispatcher.execute(&intent).await;

        assert!(result.success);
        assert_eq!(result.data, json!({ "scene": 2, "changed": true }));
        assert_eq!(switcher.calls(), vec!["switch:Camera 2"]);
        assert!(matches!(
            rx.recv().await.unwrap(),
            SystemEvent::CommandExecuted { .. }
        ));

        let intent = Intent::switcher("switch_scene").with_params(IntentParams {
            scene_number: Some(9),
            ..Default::default()
        });
        let result = dispatcher.execute(&intent).await;
        assert_eq!(
            result.message.as_deref(),
            Some("Scene 9 not found. Available: 1-3")
        );
    }

    #[tokio::test]
    async fn test_switch_scene_requires_scene() {
        let (dispatcher, _, _) = dispatcher(Some(FakeSwitcher::ready()));
        let err = dispatcher
            .try_execute(&Intent::switcher("switch_scene"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_recording_idempotent() {
        let switcher = FakeSwitcher::ready();
        let (dispatcher, _, _) = dispatcher(Some(switcher.clone()));

        let first = dispatcher.execute(&Intent::switcher("start_recording")).await;
        let second = dispatcher.execute(&Intent::switcher("start_recording")).await;
        assert_eq!(first.data["changed"], true);
        assert_eq!(second.data["changed"], false);
        assert_eq!(switcher.calls(), vec!["StartRecord"]);
    }

    #[tokio::test]
    async fn test_mute_requires_source() {
        let switcher = FakeSwitcher::ready();
        let (dispatcher, _, _) = dispatcher(Some(switcher.clone()));

        let result = dispatcher.execute(&Intent::switcher("mute")).await;
        assert_eq!(result.error_kind.as_deref(), Some("bad_request"));

        let intent = Intent::switcher("unmute").with_params(IntentParams {
            source: Some("Mic/Aux".to_string()),
            ..Default::default()
        });
        assert!(dispatcher.execute(&intent).await.success);
        assert_eq!(switcher.calls(), vec!["mute:Mic/Aux:false"]);
    }

    #[tokio::test]
    async fn test_switcher_not_ready() {
        let switcher = FakeSwitcher::ready();
        switcher.session.lock().connection_state = ConnectionState::Connecting;
        let (dispatcher, _, _) = dispatcher(Some(switcher));

        let result = dispatcher.execute(&Intent::switcher("stop_streaming")).await;
        assert_eq!(result.error_kind.as_deref(), Some("not_connected"));
    }
}
