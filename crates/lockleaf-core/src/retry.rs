//! Bounded retry with exponential backoff for remote store calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::CoreError;

pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(200);

/// Run `op` up to [`MAX_ATTEMPTS`] times, doubling the delay between
/// attempts. Returns the last error once every attempt has failed.
pub async fn with_backoff<T, F, Fut>(label: &str, mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut delay = BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(label, attempt, error = %err, "remote call failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
