//! Running blocking device and file calls from async code

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::block_in_place;

/// Run a blocking call without stalling the other tasks on this worker
///
/// On a multi-threaded runtime the call goes through [`block_in_place`], so
/// the worker's queued tasks move to another thread while it runs. On a
/// current-thread runtime, or outside a runtime, `f` is called directly
/// since `block_in_place` would panic there.
pub fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(f),
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_current_thread_runtime() {
        assert_eq!(run_blocking(|| "direct"), "direct");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_multi_thread_runtime_keeps_other_tasks_running() {
        let (tx, rx) = std::sync::mpsc::channel();
        let ticker = tokio::spawn(async move {
            tx.send(()).ok();
        });

        // Blocks this worker until the spawned task has run elsewhere
        let received = run_blocking(|| rx.recv_timeout(std::time::Duration::from_secs(5)));
        assert!(received.is_ok());
        ticker.await.unwrap();
    }
}
