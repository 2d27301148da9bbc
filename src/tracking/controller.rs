//! Tracking control step
//!
//! One call to [`TrackingController::step`] turns one detection (or its
//! absence) into at most one directional move:
//!
//! 1. no detection: stop if moving, go idle
//! 2. target inside the deadzone: stop if moving
//! 3. inside the cooldown since the last move: record the detection only
//! 4. otherwise move in the direction the axis policy picks, wait `settle`,
//!    then send an explicit stop
//!
//! A `settle` of zero leaves the camera driving until the target is centered
//! or lost.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::policy::{self, AxisPolicy};
use super::types::{DetectionPoint, TrackerState, TrackingStatus};
use crate::config::TrackingConfig;
use crate::ptz::{PanTiltDirection, PtzCamera};

/// Control parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub deadzone_pct: f64,
    pub cooldown: Duration,
    pub settle: Duration,
    pub center_x: f64,
    pub center_y: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self::from(&TrackingConfig::default())
    }
}

impl From<&TrackingConfig> for TrackingSettings {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            deadzone_pct: config.deadzone_pct,
            cooldown: Duration::from_millis(config.cooldown_ms),
            settle: Duration::from_millis(config.settle_ms),
            center_x: config.center_x,
            center_y: config.center_y,
        }
    }
}

/// What a control step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No detection
    Lost,
    /// Target inside the deadzone
    Centered,
    /// Detection arrived inside the cooldown window
    CoolingDown,
    /// One directional move was issued (and stopped, unless continuous)
    Moved(PanTiltDirection),
    /// Settle was cut short by cancellation; the stop was still sent
    Cancelled(PanTiltDirection),
}

pub struct TrackingController {
    camera: Arc<PtzCamera>,
    policy: Box<dyn AxisPolicy>,
    settings: TrackingSettings,
    state: TrackerState,
    last_move: Option<Instant>,
    state_tx: Arc<watch::Sender<TrackerState>>,
}

impl TrackingController {
    pub fn new(
        camera: Arc<PtzCamera>,
        policy: Box<dyn AxisPolicy>,
        settings: TrackingSettings,
        state_tx: Arc<watch::Sender<TrackerState>>,
    ) -> Self {
        let state = TrackerState {
            cooldown_ms: settings.cooldown.as_millis() as u64,
            deadzone_pct: settings.deadzone_pct,
            ..Default::default()
        };
        state_tx.send_replace(state.clone());

        Self {
            camera,
            policy,
            settings,
            state,
            last_move: None,
            state_tx,
        }
    }

    /// Build a controller from configuration
    pub fn from_config(
        camera: Arc<PtzCamera>,
        config: &TrackingConfig,
        state_tx: Arc<watch::Sender<TrackerState>>,
    ) -> Self {
        Self::new(
            camera,
            policy::from_kind(config.axis_policy),
            TrackingSettings::from(config),
            state_tx,
        )
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    /// Run one control step
    pub async fn step(
        &mut self,
        detection: Option<DetectionPoint>,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let outcome = self.run_step(detection, cancel).await;
        trace!("Tracking step: {:?}", outcome);
        self.publish();
        outcome
    }

    async fn run_step(
        &mut self,
        detection: Option<DetectionPoint>,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let Some(detection) = detection else {
            if self.state.status == TrackingStatus::Tracking {
                debug!("Target lost");
            }
            self.stop_if_moving().await;
            self.state.status = TrackingStatus::Idle;
            return StepOutcome::Lost;
        };

        let (offset_x, offset_y) =
            detection.offset_pct(self.settings.center_x, self.settings.center_y);
        self.state.status = TrackingStatus::Tracking;
        self.state.last_detection = Some(detection);

        let threshold = self.settings.deadzone_pct / 2.0;
        let direction = self.policy.select(offset_x, offset_y, threshold);
        if direction.is_stop() {
            self.stop_if_moving().await;
            return StepOutcome::Centered;
        }

        if let Some(last) = self.last_move {
            if last.elapsed() < self.settings.cooldown {
                return StepOutcome::CoolingDown;
            }
        }

        debug!(
            "Target offset ({:.1}, {:.1}) -> {:?} ({})",
            offset_x,
            offset_y,
            direction,
            self.policy.name()
        );
        self.last_move = Some(Instant::now());
        self.state.last_move_at = Some(Utc::now());
        self.state.move_count += 1;
        self.state.is_moving = true;

        match self.camera.drive(direction).await {
            Ok(true) => {}
            // Logged and published by the camera
            Ok(false) => {}
            Err(e) => warn!("Tracking move not sent: {}", e),
        }

        if self.settings.settle.is_zero() {
            return StepOutcome::Moved(direction);
        }

        self.publish();
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.settings.settle) => false,
        };
        self.stop_if_moving().await;

        if cancelled {
            StepOutcome::Cancelled(direction)
        } else {
            StepOutcome::Moved(direction)
        }
    }

    /// Stop any motion and go idle
    pub async fn halt(&mut self) {
        self.stop_if_moving().await;
        self.state.status = TrackingStatus::Idle;
        self.publish();
    }

    async fn stop_if_moving(&mut self) {
        if !self.state.is_moving {
            return;
        }
        if let Err(e) = self.camera.stop().await {
            warn!("Tracking stop not sent: {}", e);
        }
        self.state.is_moving = false;
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptz::camera::testing::{drive_frame, recording_camera, RecordingTransport};
    use crate::tracking::policy::Simultaneous;

    fn controller(settings: TrackingSettings) -> (TrackingController, Arc<RecordingTransport>) {
        let (camera, transport, _) = recording_camera();
        let (state_tx, _) = watch::channel(TrackerState::default());
        let controller = TrackingController::new(
            camera,
            Box::new(policy::DominantAxis),
            settings,
            Arc::new(state_tx),
        );
        (controller, transport)
    }

    fn stop_frame() -> Vec<u8> {
        drive_frame(PanTiltDirection::Stop)
    }

    #[tokio::test(start_paused = true)]
    async fn test_centered_target_sends_nothing() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();

        for (x, y) in [(0.5, 0.5), (0.55, 0.45), (0.46, 0.54)] {
            let outcome = ctl.step(Some(DetectionPoint::new(x, y)), &cancel).await;
            assert_eq!(outcome, StepOutcome::Centered);
        }
        assert!(transport.frames().is_empty());
        assert_eq!(ctl.state().status, TrackingStatus::Tracking);
        assert_eq!(ctl.state().move_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadzone_boundary_on_both_axes() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();

        // Exactly half the 10% deadzone away from center on each side
        for (x, y) in [(0.55, 0.5), (0.45, 0.5), (0.5, 0.55), (0.5, 0.45), (0.55, 0.55)] {
            let outcome = ctl.step(Some(DetectionPoint::new(x, y)), &cancel).await;
            assert_eq!(outcome, StepOutcome::Centered, "({}, {})", x, y);
        }
        assert!(transport.frames().is_empty());
        assert_eq!(ctl.state().move_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_center_moves_then_stops() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = ctl.step(Some(DetectionPoint::new(0.62, 0.5)), &cancel).await;

        assert_eq!(outcome, StepOutcome::Moved(PanTiltDirection::Right));
        assert_eq!(
            transport.frames(),
            vec![drive_frame(PanTiltDirection::Right), stop_frame()]
        );
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(ctl.state().move_count, 1);
        assert!(!ctl.state().is_moving);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_axis_per_step() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();

        let outcome = ctl.step(Some(DetectionPoint::new(0.4, 0.1)), &cancel).await;
        assert_eq!(outcome, StepOutcome::Moved(PanTiltDirection::Up));
        assert_eq!(
            transport.frames(),
            vec![drive_frame(PanTiltDirection::Up), stop_frame()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_moves() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();
        let far_right = || Some(DetectionPoint::new(0.9, 0.5));

        ctl.step(far_right(), &cancel).await;
        // 200 ms of settle elapsed, cooldown is 300 ms
        assert_eq!(ctl.step(far_right(), &cancel).await, StepOutcome::CoolingDown);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(ctl.step(far_right(), &cancel).await, StepOutcome::CoolingDown);
        assert_eq!(transport.frames().len(), 2);
        assert_eq!(ctl.state().last_detection.as_ref().map(|d| d.x), Some(0.9));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(
            ctl.step(far_right(), &cancel).await,
            StepOutcome::Moved(PanTiltDirection::Right)
        );
        assert_eq!(transport.frames().len(), 4);
        assert_eq!(ctl.state().move_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_mode_stops_on_lost() {
        let settings = TrackingSettings {
            settle: Duration::ZERO,
            ..Default::default()
        };
        let (mut ctl, transport) = controller(settings);
        let cancel = CancellationToken::new();

        ctl.step(Some(DetectionPoint::new(0.2, 0.5)), &cancel).await;
        assert!(ctl.state().is_moving);
        assert_eq!(transport.frames(), vec![drive_frame(PanTiltDirection::Left)]);

        assert_eq!(ctl.step(None, &cancel).await, StepOutcome::Lost);
        assert!(!ctl.state().is_moving);
        assert_eq!(ctl.state().status, TrackingStatus::Idle);
        assert_eq!(transport.frames().last(), Some(&stop_frame()));

        // Already stopped: no second stop
        ctl.step(None, &cancel).await;
        assert_eq!(transport.frames().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_mode_stops_when_centered() {
        let settings = TrackingSettings {
            settle: Duration::ZERO,
            ..Default::default()
        };
        let (mut ctl, transport) = controller(settings);
        let cancel = CancellationToken::new();

        ctl.step(Some(DetectionPoint::new(0.5, 0.8)), &cancel).await;
        assert_eq!(
            ctl.step(Some(DetectionPoint::new(0.5, 0.52)), &cancel).await,
            StepOutcome::Centered
        );
        assert_eq!(
            transport.frames(),
            vec![drive_frame(PanTiltDirection::Down), stop_frame()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_does_not_stop_loop() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();

        transport.set_failing(true);
        let outcome = ctl.step(Some(DetectionPoint::new(0.9, 0.5)), &cancel).await;
        assert_eq!(outcome, StepOutcome::Moved(PanTiltDirection::Right));
        assert!(transport.frames().is_empty());

        transport.set_failing(false);
        tokio::time::advance(Duration::from_millis(300)).await;
        ctl.step(Some(DetectionPoint::new(0.9, 0.5)), &cancel).await;
        assert_eq!(transport.frames().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_settle_short() {
        let (mut ctl, transport) = controller(TrackingSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = Instant::now();

        let outcome = ctl.step(Some(DetectionPoint::new(0.9, 0.5)), &cancel).await;

        assert_eq!(outcome, StepOutcome::Cancelled(PanTiltDirection::Right));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(transport.frames().last(), Some(&stop_frame()));
        assert!(!ctl.state().is_moving);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simultaneous_policy_drives_diagonal() {
        let (camera, transport, _) = recording_camera();
        let (state_tx, mut state_rx) = watch::channel(TrackerState::default());
        let mut ctl = TrackingController::new(
            camera,
            Box::new(Simultaneous),
            TrackingSettings::default(),
            Arc::new(state_tx),
        );

        ctl.step(Some(DetectionPoint::new(0.9, 0.1)), &CancellationToken::new())
            .await;
        assert_eq!(transport.frames()[0], drive_frame(PanTiltDirection::UpRight));

        assert!(state_rx.has_changed().unwrap());
        assert_eq!(state_rx.borrow_and_update().move_count, 1);
    }
}
