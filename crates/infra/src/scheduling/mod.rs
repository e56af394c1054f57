//! Cron scheduling for relay runs

pub mod error;
pub mod relay_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use relay_scheduler::{RelayJob, RelayScheduler, RelaySchedulerConfig};
