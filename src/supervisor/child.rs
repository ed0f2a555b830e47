use super::policy::{Policy, Step};
use crate::error::Result;
use crate::store::Store;
use clap::{Args, ValueEnum};
use std::ffi::OsString;
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

pub const EXIT_SPAWN_FAILED: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Once,
    Retry,
    Restart,
}

#[derive(Debug, Clone, Args)]
pub struct ChildArgs {
    #[arg(long = "state-dir")]
    pub state_dir: PathBuf,
    #[arg(long)]
    pub job: u64,
    #[arg(long)]
    pub shell: String,
    #[arg(long, value_enum, default_value_t = Mode::Once)]
    pub mode: Mode,
    // 0 means unlimited.
    #[arg(long, default_value_t = 0)]
    pub attempts: u32,
    #[arg(long = "delay-ms", default_value_t = 0)]
    pub delay_ms: u64,
    #[arg(last = true, required = true)]
    pub command: String,
}

impl ChildArgs {
    pub fn new(state_dir: PathBuf, job: u64, shell: &str, command: &str, policy: Policy) -> Self {
        let (mode, attempts, delay) = match policy {
            Policy::Once => (Mode::Once, 0, Duration::ZERO),
            Policy::Retry {
                max_attempts,
                delay,
            } => (Mode::Retry, max_attempts.unwrap_or(0), delay),
            Policy::Restart { delay } => (Mode::Restart, 0, delay),
        };

        Self {
            state_dir,
            job,
            shell: shell.to_string(),
            mode,
            attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            command: command.to_string(),
        }
    }

    pub fn policy(&self) -> Policy {
        let delay = Duration::from_millis(self.delay_ms);
        match self.mode {
            Mode::Once => Policy::Once,
            Mode::Retry => Policy::Retry {
                max_attempts: (self.attempts > 0).then_some(self.attempts),
                delay,
            },
            Mode::Restart => Policy::Restart { delay },
        }
    }

    pub fn to_args(&self) -> Vec<OsString> {
        let mode = match self.mode {
            Mode::Once => "once",
            Mode::Retry => "retry",
            Mode::Restart => "restart",
        };

        vec![
            "supervise".into(),
            "--state-dir".into(),
            self.state_dir.clone().into_os_string(),
            "--job".into(),
            self.job.to_string().into(),
            "--shell".into(),
            self.shell.clone().into(),
            "--mode".into(),
            mode.into(),
            "--attempts".into(),
            self.attempts.to_string().into(),
            "--delay-ms".into(),
            self.delay_ms.to_string().into(),
            "--".into(),
            self.command.clone().into(),
        ]
    }
}

pub fn supervise(args: &ChildArgs) -> Result<i32> {
    let store = Store::open(&args.state_dir)?;
    let policy = args.policy();
    debug!(job = args.job, ?policy, "supervising job");

    let mut out = std::io::stdout();
    let code = run_attempts(policy, &mut out, || run_once(&args.shell, &args.command));

    super::complete(&store, args.job, code)?;
    Ok(code)
}

pub fn run_attempts(policy: Policy, out: &mut impl Write, mut attempt: impl FnMut() -> i32) -> i32 {
    let mut number: u32 = 1;

    loop {
        banner_before(out, policy, number);
        let code = attempt();

        match policy.after_attempt(number, code) {
            Step::Complete(code) => {
                if code != 0
                    && let Policy::Retry {
                        max_attempts: Some(max),
                        ..
                    } = policy
                {
                    banner(out, &format!("All {max} attempts ruined"));
                }
                return code;
            }
            Step::Again(delay) => {
                match policy {
                    Policy::Restart { .. } => banner(
                        out,
                        &format!(
                            "Failed with exit {code}, restarting in {}...",
                            humantime::format_duration(delay)
                        ),
                    ),
                    _ => banner(
                        out,
                        &format!("Attempt {number} ruined (exit {code}), trying again..."),
                    ),
                }
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                number = number.saturating_add(1);
            }
        }
    }
}

fn banner_before(out: &mut impl Write, policy: Policy, number: u32) {
    match policy {
        Policy::Once => {}
        Policy::Retry {
            max_attempts: Some(max),
            ..
        } => banner(out, &format!("Attempt {number} of {max}")),
        Policy::Retry { .. } => banner(out, &format!("Attempt {number}")),
        Policy::Restart { .. } => {
            let now = OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "-".to_string());
            banner(out, &format!("Starting: {now}"));
        }
    }
}

fn banner(out: &mut impl Write, text: &str) {
    let _ = writeln!(out, "=== {text} ===");
    let _ = out.flush();
}

fn run_once(shell: &str, command: &str) -> i32 {
    match Command::new(shell).arg("-c").arg(command).status() {
        Ok(status) => exit_code(status),
        Err(err) => {
            eprintln!("bj: failed to start {shell}: {err}");
            EXIT_SPAWN_FAILED
        }
    }
}

pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}
