use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Sleep for `dur` unless `cancel` fires first.
pub async fn sleep_cancellable(dur: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
    if dur.is_zero() {
        return if cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(dur) => Ok(()),
    }
}
