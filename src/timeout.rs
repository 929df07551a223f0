use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a deadline-bound operation ended.
///
/// `Elapsed` means the deadline fired first: the attempt token has been
/// cancelled so the underlying transport stops work. `Interrupted` means the
/// attempt token was cancelled from outside the harness (caller abort) before
/// the deadline.
#[derive(Debug)]
pub(crate) enum DeadlineOutcome<T> {
    Completed(T),
    Elapsed,
    Interrupted,
}

/// Race `op` against `timeout`. The timer is dropped as soon as `op`
/// resolves; on expiry the attempt token is cancelled before reporting
/// `Elapsed`.
pub(crate) async fn run_with_deadline<F, T>(
    op: F,
    timeout: Duration,
    attempt_cancel: &CancellationToken,
) -> DeadlineOutcome<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        output = op => DeadlineOutcome::Completed(output),
        _ = attempt_cancel.cancelled() => DeadlineOutcome::Interrupted,
        _ = tokio::time::sleep(timeout) => {
            attempt_cancel.cancel();
            DeadlineOutcome::Elapsed
        }
    }
}
