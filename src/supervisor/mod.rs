mod child;
mod detach;
mod policy;

pub use child::{ChildArgs, EXIT_SPAWN_FAILED, Mode, exit_code, run_attempts, supervise};
pub use detach::new_session;
pub use policy::{Policy, RESTART_DELAY, Step};

use crate::error::{JobError, Result};
use crate::store::Store;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, warn};

pub const DEFAULT_SHELL: &str = "/bin/sh";

pub fn user_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SHELL.to_string())
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    store: Store,
    log_dir: PathBuf,
    shell: String,
    program: PathBuf,
}

impl Supervisor {
    pub fn new(store: Store, log_dir: impl Into<PathBuf>, shell: impl Into<String>) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| JobError::io("failed to get executable path", e))?;

        Ok(Self {
            store,
            log_dir: log_dir.into(),
            shell: shell.into(),
            program,
        })
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn run(&self, command: &str, working_dir: &Path) -> Result<u64> {
        self.spawn(command, working_dir, Policy::Once)
    }

    pub fn run_with_retry(
        &self,
        command: &str,
        working_dir: &Path,
        max_attempts: Option<u32>,
        delay: Duration,
    ) -> Result<u64> {
        self.spawn(
            command,
            working_dir,
            Policy::Retry {
                max_attempts,
                delay,
            },
        )
    }

    pub fn run_with_restart(&self, command: &str, working_dir: &Path) -> Result<u64> {
        self.spawn(command, working_dir, Policy::restart())
    }

    pub fn spawn(&self, command: &str, working_dir: &Path, policy: Policy) -> Result<u64> {
        let id = self.store.add(command, working_dir, Path::new(""))?;

        fs::create_dir_all(&self.log_dir)
            .map_err(|e| JobError::io("failed to create log directory", e))?;

        let log_path = self.log_dir.join(log_file_name(id, OffsetDateTime::now_utc()));
        self.store.update_log_path(id, &log_path)?;

        let log =
            File::create(&log_path).map_err(|e| JobError::io("failed to create log file", e))?;

        let args = ChildArgs::new(
            self.store.dir().to_path_buf(),
            id,
            &self.shell,
            command,
            policy,
        );
        let child = detach::detached_command(&self.program, &args.to_args(), working_dir, log)?
            .spawn()
            .map_err(|e| JobError::process("failed to start command", e))?;

        let pid = child.id();
        debug!(id, pid, ?policy, "job spawned");

        // The job runs either way; it just cannot be killed by id.
        if let Err(err) = self.store.update_pid(id, pid) {
            warn!(id, pid, error = %err, "failed to record pid");
        }

        Ok(id)
    }

    pub fn complete(&self, id: u64, exit_code: i32) -> Result<()> {
        complete(&self.store, id, exit_code)
    }
}

pub fn complete(store: &Store, id: u64, exit_code: i32) -> Result<()> {
    store.complete(id, exit_code)
}

pub fn log_file_name(id: u64, at: OffsetDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "00000000-000000".to_string());
    format!("{stamp}-{id}.log")
}
