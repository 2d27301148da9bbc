//! PTZ director
//!
//! Controls a VISCA-over-IP PTZ camera and an OBS-WebSocket v5 video switcher,
//! closes a visual tracking loop over detections, switches scenes from
//! free-text scene descriptions and executes structured intents.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod feed;
pub mod ptz;
pub mod rules;
pub mod state;
pub mod switcher;
pub mod tracking;
pub mod utils;

pub use error::{AppError, Result};
