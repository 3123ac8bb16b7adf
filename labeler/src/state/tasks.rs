use std::{future::Future, panic::AssertUnwindSafe, time::Duration};

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shortest pause between two runs in loop mode.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

pub fn effective_interval(secs: u64) -> Duration {
    Duration::from_secs(secs).max(MIN_INTERVAL)
}

/// Run `iteration` until `cancel` fires, sleeping `interval` between runs.
///
/// Cancellation is only observed between iterations. An iteration that fails
/// or panics is logged and the loop goes on. Returns the number of
/// iterations started.
pub async fn run_forever<F, Fut>(interval: Duration, cancel: CancellationToken, mut iteration: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut runs = 0;
    tracing::info!("Starting label loop, interval {}s", interval.as_secs());

    while !cancel.is_cancelled() {
        let started = Instant::now();
        runs += 1;

        let result = AssertUnwindSafe(iteration()).catch_unwind().await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Label run failed: {:?}", e),
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());
                tracing::error!("Label run panicked, recovering: {}", msg);
            }
        }

        tracing::info!(
            "Iteration finished ({:.1}s). Next run in {}s",
            started.elapsed().as_secs_f32(),
            interval.as_secs()
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Label loop stopped after {} runs", runs);
    runs
}
