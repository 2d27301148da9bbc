//! PTZ camera control
//!
//! Architecture:
//! ```text
//! PtzCamera (speeds, target, error policy)
//!     │
//!     ├── visca::encode  MotionCommand -> Frame (pure)
//!     │
//!     └── FrameTransport (trait)
//!             └── UdpTransport (VISCA over IP, port 1259)
//! ```

pub mod camera;
pub mod transport;
pub mod types;
pub mod visca;

pub use camera::{CameraSettings, PtzCamera};
pub use transport::{FrameTransport, UdpTransport};
pub use types::{
    Axis, FocusCommand, MotionCommand, PanTiltDirection, PresetAction, ZoomDirection,
};
pub use visca::Frame;
