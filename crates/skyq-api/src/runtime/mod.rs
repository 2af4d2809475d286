//! Background runtime thread and serial interval scheduler.

mod async_thread;
mod cron;

pub use async_thread::{AsyncThread, THREAD_NAME};
pub use cron::{CronScheduler, JobId, Schedule};
