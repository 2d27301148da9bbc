//! Configuration
//!
//! The whole configuration lives in one TOML file. [`ConfigStore`] keeps the
//! parsed copy behind an `ArcSwap` so hot paths read it without locking.

mod schema;
mod store;

pub use schema::*;
pub use store::{ConfigChange, ConfigStore, CONFIG_FILE_NAME};
