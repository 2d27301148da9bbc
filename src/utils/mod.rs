//! Utility modules
//!
//! This module contains common utilities used across the codebase.

pub mod throttle;

pub use throttle::LogThrottler;
