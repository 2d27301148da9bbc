use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::dispatch::CommandDispatcher;
use crate::error::Result;
use crate::events::EventBus;
use crate::ptz::{CameraSettings, FrameTransport, PtzCamera};
use crate::rules::SceneRuleEngine;
use crate::switcher::{Switcher, SwitcherClient};
use crate::tracking::TrackingService;

/// Application-wide state shared by the feed reader and background tasks
pub struct AppState {
    /// Configuration store
    pub config: ConfigStore,
    /// Event bus for status and outcome notifications
    pub events: Arc<EventBus>,
    /// PTZ camera behind the frame transport
    pub camera: Arc<PtzCamera>,
    /// Detection-driven tracking loop
    pub tracking: Arc<TrackingService>,
    /// Switcher client (only when enabled in configuration)
    pub switcher: Option<SwitcherClient>,
    /// Scene rule engine (requires a switcher)
    pub rules: Option<Arc<SceneRuleEngine>>,
    /// Intent dispatcher
    pub dispatcher: Arc<CommandDispatcher>,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire all components from the current configuration
    ///
    /// Nothing is started: the switcher is not connected and tracking is
    /// idle until asked.
    pub fn from_config(
        config: ConfigStore,
        transport: Arc<dyn FrameTransport>,
        events: Arc<EventBus>,
    ) -> Result<Arc<Self>> {
        let app_config = config.get();

        let settings = CameraSettings::from_config(&app_config.camera)?;
        if settings.target.is_none() {
            warn!("No camera address configured, motion commands will be rejected");
        }
        let camera = Arc::new(PtzCamera::new(transport, settings, events.clone()));
        let tracking = Arc::new(TrackingService::new(
            camera.clone(),
            config.clone(),
            events.clone(),
        ));

        let switcher = app_config
            .switcher
            .enabled
            .then(|| SwitcherClient::new(app_config.switcher.clone(), events.clone()));
        let switcher_dyn: Option<Arc<dyn Switcher>> = switcher
            .clone()
            .map(|client| Arc::new(client) as Arc<dyn Switcher>);

        let rules = switcher_dyn.clone().map(|switcher| {
            Arc::new(SceneRuleEngine::from_config(
                switcher,
                events.clone(),
                &app_config.rules,
            ))
        });

        let dispatcher = Arc::new(CommandDispatcher::new(
            Some(camera.clone()),
            Some(tracking.clone()),
            switcher_dyn,
            events.clone(),
        ));

        Ok(Arc::new(Self {
            config,
            events,
            camera,
            tracking,
            switcher,
            rules,
            dispatcher,
            shutdown: CancellationToken::new(),
        }))
    }

    /// Apply camera settings from the store whenever the configuration changes
    pub fn spawn_config_watcher(self: &Arc<Self>) {
        let state = self.clone();
        let mut rx = state.config.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = state.shutdown.cancelled() => break,
                    change = rx.recv() => match change {
                        Ok(change) => {
                            debug!("Configuration changed: {}", change.key);
                            state.apply_camera_config();
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => state.apply_camera_config(),
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    fn apply_camera_config(&self) {
        match CameraSettings::from_config(&self.config.get().camera) {
            Ok(settings) => self.camera.update_settings(settings),
            Err(e) => warn!("Ignoring camera configuration: {}", e),
        }
    }

    /// Stop tracking, halt the camera and close the switcher connection
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        self.tracking.stop().await;
        if self.camera.target().is_some() {
            if let Err(e) = self.camera.stop().await {
                debug!("Camera stop on shutdown failed: {}", e);
            }
        }
        if let Some(switcher) = &self.switcher {
            switcher.disconnect().await;
        }
        info!("Shutdown complete");
    }
}
