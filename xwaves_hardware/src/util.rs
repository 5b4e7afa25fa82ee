use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `is_done` until it returns true or `timeout` expires.
/// Sleeps `poll_interval` between polls.
pub fn wait_until_with_timeout(
    mut is_done: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !is_done() {
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
