//! Connection Monitor - tracks telemetry arrival to judge whether the drone is alive
//!
//! The drone broadcasts telemetry at roughly 10Hz once it is in SDK mode, so
//! "a packet arrived recently" is a cheap liveness signal that needs no
//! platform-specific network query.
//!
//! **App Start Relative Time Pattern**:
//! - Uses monotonic time anchored to application start
//! - Unaffected by system clock changes (NTP, manual adjustments)
//! - Safe to store in AtomicU64 for lock-free access

use crate::probe::ConnectivityProbe;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global anchor point for monotonic time
static APP_START: OnceLock<Instant> = OnceLock::new();

/// Sentinel for "no feedback received yet"
const NEVER: u64 = u64::MAX;

/// Get monotonic time as microseconds since app start
fn get_monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Telemetry freshness monitor
///
/// Unlike a command-level heartbeat, the monitor starts in the "never seen"
/// state: the drone is considered unreachable until the first packet arrives.
#[derive(Debug)]
pub struct ConnectionMonitor {
    last_feedback: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// Create a new connection monitor
    ///
    /// # Example
    /// ```
    /// # use tello_driver::heartbeat::ConnectionMonitor;
    /// # use std::time::Duration;
    /// let monitor = ConnectionMonitor::new(Duration::from_secs(1));
    /// assert!(!monitor.check_connection());
    /// monitor.register_feedback();
    /// assert!(monitor.check_connection());
    /// ```
    pub fn new(timeout: Duration) -> Self {
        // Make sure the anchor exists before any comparison
        let _ = get_monotonic_micros();
        Self {
            last_feedback: AtomicU64::new(NEVER),
            timeout,
        }
    }

    /// Returns true if feedback was received within the timeout window
    pub fn check_connection(&self) -> bool {
        match self.time_since_last_feedback() {
            Some(elapsed) => elapsed < self.timeout,
            None => false,
        }
    }

    /// Register that a telemetry packet arrived
    pub fn register_feedback(&self) {
        self.last_feedback.store(get_monotonic_micros(), Ordering::Relaxed);
    }

    /// Time since last feedback, `None` if nothing has arrived yet
    pub fn time_since_last_feedback(&self) -> Option<Duration> {
        let last_us = self.last_feedback.load(Ordering::Relaxed);
        if last_us == NEVER {
            return None;
        }
        let now_us = get_monotonic_micros();
        Some(Duration::from_micros(now_us.saturating_sub(last_us)))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ConnectivityProbe for ConnectionMonitor {
    fn is_reachable(&self) -> bool {
        self.check_connection()
    }

    fn name(&self) -> &str {
        "telemetry"
    }

    /// Telemetry only starts flowing once the drone is in SDK mode
    fn requires_handshake(&self) -> bool {
        true
    }
}
