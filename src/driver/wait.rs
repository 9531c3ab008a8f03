//! Bounded, interruptible waits

use crate::driver::{DriverError, DriverResult, Shutdown};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Polls `probe` until it yields a value, the timeout expires, or shutdown fires
///
/// `Ok(None)` from the probe means "not yet"; errors end the wait immediately.
/// The probe always runs at least once, even with a zero timeout.
pub async fn wait_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    poll_interval: Duration,
    shutdown: &Shutdown,
    mut probe: F,
) -> DriverResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if shutdown.is_triggered() {
            return Err(DriverError::Interrupted);
        }

        if let Some(value) = probe().await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(DriverError::Timeout {
                what: what.to_string(),
                after: timeout,
            });
        }

        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = shutdown.triggered() => return Err(DriverError::Interrupted),
        }
    }
}

/// Sleeps for `duration` unless shutdown fires first
pub async fn pause(duration: Duration, shutdown: &Shutdown) -> DriverResult<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = shutdown.triggered() => Err(DriverError::Interrupted),
    }
}
