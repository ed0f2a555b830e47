use super::Store;
use crate::error::Result;
use crate::model::{EXIT_ORPHANED, GRACE_PERIOD, Job};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use time::OffsetDateTime;
use tracing::debug;

impl Store {
    pub fn garbage_collect(&self) -> Result<usize> {
        let now = OffsetDateTime::now_utc();

        self.transact(|jobs| {
            let mut collected = 0;

            for job in jobs.iter_mut() {
                if !job.is_running() || job.pid == 0 || job.age(now) < GRACE_PERIOD {
                    continue;
                }

                if is_alive(job) {
                    continue;
                }

                debug!(id = job.id, pid = job.pid, "collecting orphaned job");
                job.finish(EXIT_ORPHANED, now);
                collected += 1;
            }

            Ok((collected, collected > 0))
        })
    }
}

fn is_alive(job: &Job) -> bool {
    let Ok(pid) = i32::try_from(job.pid) else {
        return false;
    };
    // EPERM counts as gone too.
    kill(Pid::from_raw(pid), None).is_ok()
}
