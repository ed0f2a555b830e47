mod gc;
mod lock;
mod retention;

pub use retention::MAX_JOB_HISTORY;

use crate::error::{JobError, Result};
use crate::model::{EXIT_KILLED, Job};
use lock::LedgerLock;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::debug;

pub const LEDGER_FILE: &str = "jobs.json";
pub const LOCK_FILE: &str = "jobs.lock";

#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
    path: PathBuf,
    lock_path: PathBuf,
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| JobError::io("failed to create state directory", e))?;

        Ok(Self {
            path: dir.join(LEDGER_FILE),
            lock_path: dir.join(LOCK_FILE),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add(&self, command: &str, working_dir: &Path, log_file: &Path) -> Result<u64> {
        self.transact(|jobs| {
            let id = jobs.iter().map(|job| job.id).max().unwrap_or(0) + 1;
            jobs.push(Job::new(
                id,
                command.to_string(),
                working_dir.to_path_buf(),
                log_file.to_path_buf(),
            ));
            debug!(id, command, "job added");
            Ok((id, true))
        })
    }

    pub fn update_log_path(&self, id: u64, log_file: &Path) -> Result<()> {
        self.transact(|jobs| {
            let job = find_mut(jobs, id)?;
            job.log_file = log_file.to_path_buf();
            Ok(((), true))
        })
    }

    pub fn update_pid(&self, id: u64, pid: u32) -> Result<()> {
        self.transact(|jobs| {
            let job = find_mut(jobs, id)?;
            job.pid = pid;
            debug!(id, pid, "pid recorded");
            Ok(((), true))
        })
    }

    pub fn complete(&self, id: u64, exit_code: i32) -> Result<()> {
        self.transact(|jobs| {
            let job = find_mut(jobs, id)?;
            job.finish(exit_code, OffsetDateTime::now_utc());
            debug!(id, exit_code, "job completed");
            retention::enforce_ceiling(jobs);
            Ok(((), true))
        })
    }

    pub fn get(&self, id: u64) -> Result<Option<Job>> {
        self.transact(|jobs| Ok((jobs.iter().find(|job| job.id == id).cloned(), false)))
    }

    pub fn list(&self) -> Result<Vec<Job>> {
        let mut jobs = self.transact(|jobs| Ok((std::mem::take(jobs), false)))?;
        jobs.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(jobs)
    }

    pub fn latest(&self) -> Result<Option<Job>> {
        Ok(self.list()?.into_iter().next())
    }

    pub fn latest_running(&self) -> Result<Option<Job>> {
        Ok(self.list()?.into_iter().find(Job::is_running))
    }

    /// Success means the signal was delivered; the process may still be
    /// shutting down when this returns.
    pub fn kill(&self, id: u64) -> Result<Job> {
        self.transact(|jobs| {
            let job = find_mut(jobs, id)?;

            if !job.is_running() {
                return Err(JobError::AlreadyTerminal(id));
            }

            if job.pid == 0 {
                return Err(JobError::NoPid(id));
            }

            let group = i32::try_from(job.pid).map_err(|_| JobError::NoPid(id))?;
            killpg(Pid::from_raw(group), Signal::SIGTERM)
                .map_err(|errno| JobError::process("failed to terminate process", errno))?;

            job.finish(EXIT_KILLED, OffsetDateTime::now_utc());
            debug!(id, pid = job.pid, "job killed");
            Ok((job.clone(), true))
        })
    }

    fn transact<T>(&self, op: impl FnOnce(&mut Vec<Job>) -> Result<(T, bool)>) -> Result<T> {
        let _lock = LedgerLock::acquire(&self.lock_path)?;

        let mut jobs = self.load()?;
        let (value, dirty) = op(&mut jobs)?;

        if dirty {
            self.save(&jobs)?;
        }

        Ok(value)
    }

    fn load(&self) -> Result<Vec<Job>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(JobError::io("failed to load jobs", err)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|e| JobError::io("failed to load jobs", e.into()))
    }

    fn save(&self, jobs: &[Job]) -> Result<()> {
        let data = serde_json::to_vec_pretty(jobs)
            .map_err(|e| JobError::io("failed to save jobs", e.into()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| JobError::io("failed to save jobs", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| JobError::io("failed to save jobs", e))
    }
}

fn find_mut(jobs: &mut [Job], id: u64) -> Result<&mut Job> {
    jobs.iter_mut()
        .find(|job| job.id == id)
        .ok_or(JobError::NotFound(id))
}
