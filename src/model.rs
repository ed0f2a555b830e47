use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;

pub const EXIT_KILLED: i32 = -15;

pub const EXIT_ORPHANED: i32 = -1;

pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    #[serde(rename = "cmd")]
    pub command: String,
    #[serde(rename = "pwd")]
    pub working_dir: PathBuf,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub log_file: PathBuf,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub pid: u32,
}

fn is_zero(pid: &u32) -> bool {
    *pid == 0
}

impl Job {
    pub fn new(id: u64, command: String, working_dir: PathBuf, log_file: PathBuf) -> Self {
        Self {
            id,
            command,
            working_dir,
            start_time: OffsetDateTime::now_utc(),
            end_time: None,
            exit_code: None,
            log_file,
            pid: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.exit_code.is_none()
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn failed(&self) -> bool {
        matches!(self.exit_code, Some(code) if code != 0)
    }

    pub fn finish(&mut self, exit_code: i32, at: OffsetDateTime) {
        self.exit_code = Some(exit_code);
        self.end_time = Some(at);
    }

    pub fn age(&self, now: OffsetDateTime) -> Duration {
        (now - self.start_time).try_into().unwrap_or(Duration::ZERO)
    }

    pub fn elapsed(&self, now: OffsetDateTime) -> Duration {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).try_into().unwrap_or(Duration::ZERO)
    }

    pub fn status(&self, now: OffsetDateTime) -> JobStatus {
        match self.exit_code {
            None if self.pid == 0 && self.age(now) >= GRACE_PERIOD => JobStatus::Incomplete,
            None => JobStatus::Running,
            Some(0) => JobStatus::Done,
            Some(EXIT_KILLED) => JobStatus::Killed,
            Some(EXIT_ORPHANED) => JobStatus::Orphaned,
            Some(code) => JobStatus::Failed(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    /// Running record that never got a pid; spawn most likely failed halfway.
    Incomplete,
    Done,
    Failed(i32),
    Killed,
    Orphaned,
}

impl JobStatus {
    pub fn label(&self) -> String {
        match self {
            JobStatus::Running => "running".to_string(),
            JobStatus::Incomplete => "incomplete".to_string(),
            JobStatus::Done => "done".to_string(),
            JobStatus::Failed(code) => format!("exit({code})"),
            JobStatus::Killed => "killed".to_string(),
            JobStatus::Orphaned => "orphaned".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running | JobStatus::Incomplete)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub running: bool,
    pub failed: bool,
    pub done: bool,
}

impl ListFilter {
    pub fn is_empty(&self) -> bool {
        !(self.running || self.failed || self.done)
    }

    pub fn matches(&self, job: &Job) -> bool {
        if self.is_empty() {
            return true;
        }

        (self.running && job.is_running())
            || (self.failed && job.failed())
            || (self.done && job.succeeded())
    }
}
