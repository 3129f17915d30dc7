//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::TetherError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, TetherError>>,
) -> Result<T, TetherError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(TetherError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_maps_to_timeout_error() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(TetherError::Timeout(250))));
    }

    #[tokio::test]
    async fn inner_result_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(TetherError::InvalidState("inner".into()))
        })
        .await;
        assert!(matches!(result, Err(TetherError::InvalidState(_))));
    }
}
