//! Retry of writes that hit SQLite lock contention
//!
//! Only `SQLITE_BUSY`/`SQLITE_LOCKED` failures are retried, with exponential
//! backoff (10 ms doubling to 1 s) until `max_wait` has elapsed. Any other
//! error is returned on the spot.

use salesmind_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(1000);

/// True for "database is locked" / "database table is locked"
pub fn is_lock_error(err: &Error) -> bool {
    let Error::Database(db_err) = err else {
        return false;
    };
    if let Some(code) = db_err.as_database_error().and_then(|e| e.code()) {
        // Primary result codes; extended codes keep them in the low byte
        if let Ok(code) = code.parse::<i32>() {
            return matches!(code & 0xff, 5 | 6);
        }
    }
    db_err.to_string().contains("database is locked")
}

pub async fn retry_on_lock<F, Fut, T>(operation: &str, max_wait: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Succeeded after lock retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if is_lock_error(&err) && started.elapsed() < max_wait => {
                tracing::warn!(
                    operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Database locked, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
            Err(err) => {
                if is_lock_error(&err) {
                    tracing::error!(
                        operation,
                        attempt,
                        max_wait_ms = max_wait.as_millis() as u64,
                        "Database still locked, giving up"
                    );
                }
                return Err(err);
            }
        }
    }
}
