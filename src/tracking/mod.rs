//! Closed-loop visual tracking
//!
//! Detections from an external detector are turned into rate-limited camera
//! moves. [`TrackingService`] owns the control loop task;
//! [`TrackingController`] holds the per-step logic and the tracker state.

pub mod controller;
pub mod policy;
pub mod service;
pub mod types;

pub use controller::{StepOutcome, TrackingController, TrackingSettings};
pub use policy::{AxisPolicy, DominantAxis, HorizontalFirst, Simultaneous};
pub use service::TrackingService;
pub use types::{DetectionPoint, TrackerState, TrackingStatus};
