//! Single-shot phase scheduler.
//!
//! Timers drive the transitions no client request is waiting on: stepping
//! through presented images, opening the vote, and moving past a finished
//! round. Scheduled work is never cancelled; callbacks must re-check game
//! state when they fire and treat a stale world as a no-op.

use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

/// Run `task` once, at least `delay` after now, on its own task.
///
/// The returned handle is only useful for tests; dropping it does not cancel
/// the timer.
pub fn after<F>(delay: Duration, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        task.await;
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let handle = after(Duration::from_secs(5), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
