use super::Store;
use crate::error::Result;
use crate::model::Job;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, warn};

pub const MAX_JOB_HISTORY: usize = 100;

impl Store {
    pub fn prune(&self) -> Result<usize> {
        self.transact(|jobs| {
            let pruned = remove_where(jobs, |job| job.succeeded());
            Ok((pruned, pruned > 0))
        })
    }

    pub fn prune_older_than(&self, age: Duration) -> Result<usize> {
        // Too far back to represent: nothing can have ended before it.
        let cutoff = time::Duration::try_from(age)
            .ok()
            .and_then(|age| OffsetDateTime::now_utc().checked_sub(age))
            .unwrap_or_else(|| PrimitiveDateTime::MIN.assume_utc());

        self.transact(|jobs| {
            let pruned = remove_where(jobs, |job| {
                job.succeeded() && job.end_time.is_some_and(|end| end < cutoff)
            });
            Ok((pruned, pruned > 0))
        })
    }
}

fn remove_where(jobs: &mut Vec<Job>, doomed: impl Fn(&Job) -> bool) -> usize {
    let before = jobs.len();

    jobs.retain(|job| {
        if !doomed(job) {
            return true;
        }
        remove_log(job);
        false
    });

    let pruned = before - jobs.len();
    if pruned > 0 {
        debug!(pruned, "pruned jobs");
    }
    pruned
}

fn remove_log(job: &Job) {
    if job.log_file.as_os_str().is_empty() {
        return;
    }

    match fs::remove_file(&job.log_file) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(id = job.id, log = %job.log_file.display(), error = %err, "failed to remove log file"),
    }
}

pub(super) fn enforce_ceiling(jobs: &mut Vec<Job>) {
    let mut terminal: Vec<&Job> = jobs.iter().filter(|job| !job.is_running()).collect();
    if terminal.len() <= MAX_JOB_HISTORY {
        return;
    }

    terminal.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| b.id.cmp(&a.id))
    });
    let evicted: HashSet<u64> = terminal[MAX_JOB_HISTORY..].iter().map(|job| job.id).collect();

    debug!(evicted = evicted.len(), "retention ceiling reached");
    jobs.retain(|job| !evicted.contains(&job.id));
}
