//! Log throttling utility
//!
//! Motion frames are sent several times per second while tracking. When a
//! camera goes away every one of them fails, so the failure is logged once
//! per interval per key instead of once per frame.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Log throttler that limits how often the same message is logged
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use ptz_director::utils::LogThrottler;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
///
/// assert!(throttler.should_log("192.168.1.90:1259"));
/// assert!(!throttler.should_log("192.168.1.90:1259"));
/// ```
pub struct LogThrottler {
    /// Last time each key was allowed through, plus how many were suppressed since
    last_logged: Mutex<HashMap<String, (Instant, u64)>>,
    interval: Duration,
}

impl LogThrottler {
    /// Create a new log throttler with the specified interval
    pub fn new(interval: Duration) -> Self {
        Self {
            last_logged: Mutex::new(HashMap::new()),
            interval,
        }
    }

    /// Create a new log throttler with interval specified in seconds
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `true` if the message for `key` should be logged now.
    pub fn should_log(&self, key: &str) -> bool {
        self.check(key).is_some()
    }

    /// Like [`should_log`](Self::should_log), but on success also returns how
    /// many messages for `key` were suppressed since the last one let through.
    pub fn check(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let mut map = self.last_logged.lock();

        match map.get_mut(key) {
            Some((last, suppressed)) if now.duration_since(*last) < self.interval => {
                *suppressed += 1;
                None
            }
            Some((last, suppressed)) => {
                let skipped = *suppressed;
                *last = now;
                *suppressed = 0;
                Some(skipped)
            }
            None => {
                map.insert(key.to_string(), (now, 0));
                Some(0)
            }
        }
    }

    /// Forget a key, so the next failure is logged immediately.
    ///
    /// Called when a target recovers.
    pub fn clear(&self, key: &str) {
        self.last_logged.lock().remove(key);
    }

    /// Get the number of tracked keys
    pub fn len(&self) -> usize {
        self.last_logged.lock().len()
    }

    /// Check if the throttler is empty
    pub fn is_empty(&self) -> bool {
        self.last_logged.lock().is_empty()
    }
}

impl Default for LogThrottler {
    /// Create a default log throttler with 5 second interval
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Macro for throttled warning logging
///
/// # Example
///
/// ```rust
/// use ptz_director::utils::LogThrottler;
/// use ptz_director::warn_throttled;
///
/// let throttler = LogThrottler::default();
/// warn_throttled!(throttler, "camera", "Send failed: {}", "host unreachable");
/// ```
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if $throttler.should_log($key) {
            tracing::warn!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_should_log_first_call() {
        let throttler = LogThrottler::with_secs(1);
        assert!(throttler.should_log("10.0.0.5:1259"));
    }

    #[test]
    fn test_throttling() {
        let throttler = LogThrottler::new(Duration::from_millis(100));

        assert!(throttler.should_log("cam"));
        assert!(!throttler.should_log("cam"));

        thread::sleep(Duration::from_millis(150));

        assert!(throttler.should_log("cam"));
    }

    #[test]
    fn test_suppressed_count() {
        let throttler = LogThrottler::new(Duration::from_millis(50));

        assert_eq!(throttler.check("cam"), Some(0));
        assert_eq!(throttler.check("cam"), None);
        assert_eq!(throttler.check("cam"), None);

        thread::sleep(Duration::from_millis(80));

        assert_eq!(throttler.check("cam"), Some(2));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("cam-a"));
        assert!(throttler.should_log("cam-b"));
        assert!(!throttler.should_log("cam-a"));
        assert_eq!(throttler.len(), 2);
    }

    #[test]
    fn test_clear() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("cam"));
        assert!(!throttler.should_log("cam"));

        throttler.clear("cam");
        assert!(throttler.is_empty());
        assert!(throttler.should_log("cam"));
    }
}
