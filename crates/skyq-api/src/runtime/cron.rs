//! `CronScheduler` - serial interval scheduler running on a tokio runtime.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Error, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Longest interval a [`Schedule`] accepts.
const MAX_INTERVAL: Duration = Duration::from_secs(365 * DAY);

/// How often a job runs.
///
/// Parses `@hourly`, `@daily`, `@weekly` and `<n><unit>` where unit is one of
/// `s`, `m`, `h`, `d` (e.g. `30s`, `15m`, `6h`, `2d`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schedule {
    interval: Duration,
}

impl Schedule {
    /// Runs every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero interval or one longer than
    /// 365 days.
    pub fn every(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidInput(String::from(
                "schedule interval must be greater than zero",
            )));
        }
        if interval > MAX_INTERVAL {
            return Err(Error::InvalidInput(format!(
                "schedule interval {interval:?} exceeds 365 days"
            )));
        }
        Ok(Self { interval })
    }

    /// Time between runs.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let expr = s.trim().to_ascii_lowercase();
        let secs = match expr.as_str() {
            "@hourly" => HOUR,
            "@daily" => DAY,
            "@weekly" => DAY * 7,
            _ => {
                let invalid = || Error::InvalidInput(format!("unsupported schedule: {s:?}"));
                let split = expr
                    .char_indices()
                    .last()
                    .map(|(i, _)| i)
                    .ok_or_else(invalid)?;
                let (count, unit) = expr.split_at(split);
                let count: u64 = count.parse().map_err(|_| invalid())?;
                let unit_secs = match unit {
                    "s" => 1,
                    "m" => MINUTE,
                    "h" => HOUR,
                    "d" => DAY,
                    _ => return Err(invalid()),
                };
                count.checked_mul(unit_secs).ok_or_else(invalid)?
            }
        };
        Self::every(Duration::from_secs(secs))
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.interval.as_secs();
        if self.interval.subsec_nanos() != 0 {
            write!(f, "{:?}", self.interval)
        } else if secs % DAY == 0 {
            write!(f, "{}d", secs / DAY)
        } else if secs % HOUR == 0 {
            write!(f, "{}h", secs / HOUR)
        } else if secs % MINUTE == 0 {
            write!(f, "{}m", secs / MINUTE)
        } else {
            write!(f, "{secs}s")
        }
    }
}

/// Identifies a job registered with a [`CronScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

type JobFn = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

enum Command {
    Add {
        id: JobId,
        schedule: Schedule,
        job: JobFn,
    },
    Remove(JobId),
}

struct Job {
    schedule: Schedule,
    run: JobFn,
}

/// Runs jobs on fixed intervals, one at a time.
///
/// All jobs share one task: a run is awaited to completion before the next
/// due job starts, so runs never overlap. A job that fell due more than once
/// while another job was running runs once, then resumes its interval.
#[derive(Debug)]
pub struct CronScheduler {
    commands: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { id, schedule, .. } => f
                .debug_struct("Add")
                .field("id", id)
                .field("schedule", schedule)
                .finish_non_exhaustive(),
            Self::Remove(id) => f.debug_tuple("Remove").field(id).finish(),
        }
    }
}

impl CronScheduler {
    /// Starts an empty scheduler on `handle`.
    #[must_use]
    pub fn start(handle: &Handle) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = handle.spawn(run_scheduler(rx));
        Self {
            commands,
            next_id: AtomicU64::new(1),
            task: Mutex::new(Some(task)),
        }
    }

    /// Registers `job`; its first run is one interval from now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the scheduler has been stopped.
    pub fn add<F, Fut>(&self, schedule: Schedule, mut job: F) -> Result<JobId>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let run: JobFn = Box::new(move || job().boxed());
        self.commands
            .send(Command::Add {
                id,
                schedule,
                job: run,
            })
            .map_err(|_| Error::Runtime(String::from("scheduler is stopped")))?;
        tracing::debug!(%id, %schedule, "Job scheduled");
        Ok(id)
    }

    /// Removes a job. Removing an unknown id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the scheduler has been stopped.
    pub fn remove(&self, id: JobId) -> Result<()> {
        self.commands
            .send(Command::Remove(id))
            .map_err(|_| Error::Runtime(String::from("scheduler is stopped")))
    }

    /// Stops the scheduler task, cancelling any run in progress.
    pub fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            tracing::debug!("Scheduler stopped");
        }
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run_scheduler(mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut jobs: HashMap<JobId, Job> = HashMap::new();
    let mut queue: BinaryHeap<Reverse<(Instant, JobId)>> = BinaryHeap::new();

    loop {
        let next_due = queue.peek().map(|Reverse((at, _))| *at);

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Add { id, schedule, job }) => {
                    let Some(first) = Instant::now().checked_add(schedule.interval()) else {
                        tracing::warn!(%id, %schedule, "Job interval out of range, not scheduled");
                        continue;
                    };
                    queue.push(Reverse((first, id)));
                    jobs.insert(id, Job { schedule, run: job });
                }
                Some(Command::Remove(id)) => {
                    if jobs.remove(&id).is_some() {
                        tracing::debug!(%id, "Job removed");
                    }
                }
                None => break,
            },
            () = sleep_until(next_due) => {
                let Some(Reverse((due, id))) = queue.pop() else {
                    continue;
                };
                // Removed jobs leave stale queue entries behind.
                let Some(job) = jobs.get_mut(&id) else {
                    continue;
                };

                tracing::debug!(%id, "Running job");
                (job.run)().await;

                let interval = job.schedule.interval();
                let now = Instant::now();
                let next = match due.checked_add(interval) {
                    Some(next) if next > now => Some(next),
                    _ => {
                        tracing::debug!(%id, "Job overran its interval, coalescing missed runs");
                        now.checked_add(interval)
                    }
                };
                match next {
                    Some(next) => queue.push(Reverse((next, id))),
                    None => {
                        tracing::warn!(%id, "Next run out of range, dropping job");
                        jobs.remove(&id);
                    }
                }
            }
        }
    }
    tracing::debug!("Scheduler exiting");
}
