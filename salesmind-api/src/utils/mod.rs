//! Database helpers shared by services

pub mod db_retry;
pub mod pool_monitor;

pub use db_retry::{is_lock_error, retry_on_lock};
pub use pool_monitor::{begin_monitored, MonitoredTransaction};
