//! Intent routing to the camera and the switcher

pub mod dispatcher;
pub mod types;

pub use dispatcher::CommandDispatcher;
pub use types::{ActionCategory, CommandResult, Intent, IntentParams};
