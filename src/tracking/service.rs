//! Tracking control loop
//!
//! The service owns one long-lived task per tracking session. Detections go
//! into a single latest-value slot without blocking the producer: a newer
//! detection (or a lost signal) overwrites one the loop has not consumed yet,
//! so the loop always acts on the newest input.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::controller::TrackingController;
use super::types::{DetectionPoint, TrackerState};
use crate::config::ConfigStore;
use crate::events::{EventBus, SystemEvent};
use crate::ptz::PtzCamera;

struct RunningLoop {
    latest: watch::Sender<Option<DetectionPoint>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct TrackingService {
    camera: Arc<PtzCamera>,
    config: ConfigStore,
    events: Arc<EventBus>,
    state_tx: Arc<watch::Sender<TrackerState>>,
    running: Mutex<Option<RunningLoop>>,
}

impl TrackingService {
    pub fn new(camera: Arc<PtzCamera>, config: ConfigStore, events: Arc<EventBus>) -> Self {
        let (state_tx, _) = watch::channel(TrackerState::default());
        Self {
            camera,
            config,
            events,
            state_tx: Arc::new(state_tx),
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Latest tracker state
    pub fn state(&self) -> TrackerState {
        self.state_tx.borrow().clone()
    }

    /// Watch tracker state changes
    pub fn watch(&self) -> watch::Receiver<TrackerState> {
        self.state_tx.subscribe()
    }

    /// Start the control loop with the current tracking configuration
    ///
    /// Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.is_some() {
            return false;
        }

        let config = self.config.get().tracking.clone();
        let (latest, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let controller =
            TrackingController::from_config(self.camera.clone(), &config, self.state_tx.clone());

        info!(
            "Tracking started (deadzone {}%, cooldown {} ms, settle {} ms, {:?})",
            config.deadzone_pct, config.cooldown_ms, config.settle_ms, config.axis_policy
        );
        let handle = tokio::spawn(control_loop(controller, rx, cancel.clone()));
        *running = Some(RunningLoop {
            latest,
            cancel,
            handle,
        });
        drop(running);

        self.events
            .publish(SystemEvent::TrackingStateChanged { enabled: true });
        true
    }

    /// Hand a detection (`None` = target lost) to the loop without waiting
    ///
    /// Replaces any detection the loop has not picked up yet. Returns `false`
    /// only if tracking is not running.
    pub fn submit(&self, detection: Option<DetectionPoint>) -> bool {
        let running = self.running.lock();
        let Some(running) = running.as_ref() else {
            return false;
        };
        running.latest.send_replace(detection);
        true
    }

    /// Stop the control loop
    ///
    /// Cancels a pending settle, stops the camera if it is moving and waits
    /// for the loop to exit. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return false;
        };

        running.cancel.cancel();
        drop(running.latest);
        if let Err(e) = running.handle.await {
            debug!("Tracking loop ended abnormally: {}", e);
        }

        info!("Tracking stopped");
        self.events
            .publish(SystemEvent::TrackingStateChanged { enabled: false });
        true
    }
}

async fn control_loop(
    mut controller: TrackingController,
    mut rx: watch::Receiver<Option<DetectionPoint>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let detection = rx.borrow_and_update().clone();
        controller.step(detection, &cancel).await;
    }

    controller.halt().await;
}
