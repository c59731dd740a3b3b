//! Polling assertions for effects that land asynchronously, such as a mock
//! server noticing that a client hung up.

use std::time::Duration;

use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or `timeout` expires.
///
/// Returns whether the condition held; the caller asserts on the result so the
/// failure message stays at the call site.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// use fxconfig_test_utils::assert_eventually;
///
/// # async fn example() {
/// let open_streams = Arc::new(AtomicUsize::new(1));
/// let streams = Arc::clone(&open_streams);
/// tokio::spawn(async move {
///     tokio::time::sleep(Duration::from_millis(50)).await;
///     streams.store(0, Ordering::SeqCst);
/// });
///
/// let closed = assert_eventually(Duration::from_millis(500), || {
///     open_streams.load(Ordering::SeqCst) == 0
/// })
/// .await;
/// assert!(closed, "stream should be released");
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }

    // One last look after the deadline.
    condition()
}
