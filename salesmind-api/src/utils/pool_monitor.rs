//! Timed transactions
//!
//! [`begin_monitored`] wraps `pool.begin()` and logs how long the caller
//! waited for a connection and how long it kept it. A transaction dropped
//! without commit (the error path) is rolled back by sqlx and logged here.

use salesmind_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::{Duration, Instant};

const SLOW_ACQUIRE: Duration = Duration::from_millis(500);
const STALLED_ACQUIRE: Duration = Duration::from_millis(1000);
const SLOW_HOLD: Duration = Duration::from_millis(1000);
const STALLED_HOLD: Duration = Duration::from_millis(2000);

pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    /// Connection to run statements on
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", self.caller)))
    }

    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await?;
        log_release(self.caller, self.acquired_at.elapsed(), "commit");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback().await?;
        log_release(self.caller, self.acquired_at.elapsed(), "rollback");
        Ok(())
    }

    fn take(&mut self) -> Result<Transaction<'c, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", self.caller)))
    }
}

impl Drop for MonitoredTransaction<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            log_release(self.caller, self.acquired_at.elapsed(), "drop");
        }
    }
}

fn log_release(caller: &'static str, held: Duration, via: &'static str) {
    let held_ms = held.as_millis() as u64;
    if held > STALLED_HOLD {
        tracing::warn!(caller, held_ms, via, "Long transaction held a connection");
    } else if held > SLOW_HOLD {
        tracing::info!(caller, held_ms, via, "Transaction held longer than expected");
    } else {
        tracing::debug!(caller, held_ms, via, "Connection released");
    }
}

/// Begin a transaction, logging acquisition latency under `caller`
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    let tx = pool.begin().await?;
    let waited = start.elapsed();
    let wait_ms = waited.as_millis() as u64;

    if waited > STALLED_ACQUIRE {
        tracing::warn!(caller, wait_ms, "Slow connection acquisition, pool may be saturated");
    } else if waited > SLOW_ACQUIRE {
        tracing::info!(caller, wait_ms, "Connection acquisition slower than expected");
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx: Some(tx),
        caller,
        acquired_at: Instant::now(),
    })
}
