use crate::support::wait_for_terminal;
use bj_cli::supervisor::{
    ChildArgs, EXIT_SPAWN_FAILED, Policy, RESTART_DELAY, Step, Supervisor, exit_code,
    log_file_name, new_session, run_attempts,
};
use bj_cli::{JobError, Store};
use nix::unistd::{Pid, getsid};
use std::ffi::OsStr;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use time::macros::datetime;

fn supervisor(dir: &TempDir) -> Supervisor {
    let store = Store::open(dir.path()).expect("open store");
    Supervisor::new(store, dir.path().join("logs"), "/bin/sh")
        .expect("supervisor")
        .with_program(env!("CARGO_BIN_EXE_bj"))
}

fn log_text(store: &Store, id: u64) -> String {
    let job = store.get(id).expect("get").expect("job");
    fs::read_to_string(&job.log_file).expect("read log")
}

#[test]
fn run_captures_output_and_exit_code() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);

    let id = sup.run("echo hello", dir.path()).expect("run");
    let job = wait_for_terminal(sup.store(), id);

    assert_eq!(job.exit_code, Some(0));
    assert!(job.pid > 0);
    assert!(job.log_file.starts_with(dir.path().join("logs")));
    assert!(
        job.log_file
            .to_string_lossy()
            .ends_with(&format!("-{id}.log"))
    );
    assert_eq!(log_text(sup.store(), id), "hello\n");
}

#[test]
fn run_records_failure_code() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);

    let id = sup.run("echo oops >&2; exit 3", dir.path()).expect("run");
    let job = wait_for_terminal(sup.store(), id);

    assert_eq!(job.exit_code, Some(3));
    assert!(job.failed());
    assert!(log_text(sup.store(), id).contains("oops"));
}

#[test]
fn run_uses_working_dir() {
    let dir = tempdir().expect("tempdir");
    let work = dir.path().join("work");
    fs::create_dir(&work).expect("mkdir");
    let sup = supervisor(&dir);

    let id = sup.run("touch marker", &work).expect("run");
    wait_for_terminal(sup.store(), id);

    assert!(work.join("marker").exists());
    assert_eq!(sup.store().get(id).expect("get").expect("job").working_dir, work);
}

#[test]
fn run_passes_quotes_through_to_shell() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);
    let command = r#"printf '%s\n' "it's \"quoted\"" '$HOME'"#;

    let id = sup.run(command, dir.path()).expect("run");
    let job = wait_for_terminal(sup.store(), id);

    assert_eq!(job.command, command);
    assert_eq!(log_text(sup.store(), id), "it's \"quoted\"\n$HOME\n");
}

#[test]
fn retry_until_success() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);
    let command = "if [ -f flag ]; then echo ok; else touch flag; exit 1; fi";

    let id = sup
        .run_with_retry(command, dir.path(), Some(3), Duration::ZERO)
        .expect("run");
    let job = wait_for_terminal(sup.store(), id);
    let log = log_text(sup.store(), id);

    assert_eq!(job.exit_code, Some(0));
    assert!(log.contains("=== Attempt 1 of 3 ==="));
    assert!(log.contains("=== Attempt 1 ruined (exit 1), trying again... ==="));
    assert!(log.contains("=== Attempt 2 of 3 ==="));
    assert!(!log.contains("Attempt 3"));
    assert!(log.contains("ok"));
}

#[test]
fn retry_exhausted_reports_last_code() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);

    let id = sup
        .run_with_retry("exit 4", dir.path(), Some(2), Duration::ZERO)
        .expect("run");
    let job = wait_for_terminal(sup.store(), id);
    let log = log_text(sup.store(), id);

    assert_eq!(job.exit_code, Some(4));
    assert!(log.contains("=== Attempt 2 of 2 ==="));
    assert!(log.contains("=== All 2 attempts ruined ==="));
}

#[test]
fn job_runs_as_session_leader() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);

    let id = sup.run("sleep 30", dir.path()).expect("run");
    let job = sup.store().get(id).expect("get").expect("job");
    let pid = Pid::from_raw(job.pid as i32);

    assert_eq!(getsid(Some(pid)).expect("getsid"), pid);

    let killed = sup.store().kill(id).expect("kill");
    assert_eq!(killed.exit_code, Some(-15));
}

#[test]
fn log_dir_failure_leaves_record_without_pid() {
    let dir = tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").expect("write blocker");

    let store = Store::open(dir.path()).expect("open store");
    let sup = Supervisor::new(store, blocker.join("logs"), "/bin/sh")
        .expect("supervisor")
        .with_program(env!("CARGO_BIN_EXE_bj"));

    let err = sup.run("echo hi", dir.path()).expect_err("log dir");
    assert!(matches!(err, JobError::Io { .. }));

    let job = sup.store().get(1).expect("get").expect("job");
    assert!(job.is_running());
    assert_eq!(job.pid, 0);
    assert_eq!(job.log_file, Path::new(""));
}

#[test]
fn complete_goes_through_store() {
    let dir = tempdir().expect("tempdir");
    let sup = supervisor(&dir);
    let id = sup
        .store()
        .add("true", dir.path(), Path::new(""))
        .expect("add");

    sup.complete(id, 9).expect("complete");
    assert_eq!(
        sup.store().get(id).expect("get").expect("job").exit_code,
        Some(9)
    );
    assert!(matches!(sup.complete(99, 0), Err(JobError::NotFound(99))));
}

#[test]
fn new_session_detaches_plain_commands() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let mut child = new_session(&mut cmd).spawn().expect("spawn");
    let pid = Pid::from_raw(child.id() as i32);

    assert_eq!(getsid(Some(pid)).expect("getsid"), pid);
    assert_ne!(getsid(None).expect("own sid"), pid);

    child.kill().expect("kill");
    child.wait().expect("wait");
}

fn scripted(codes: &[i32]) -> impl FnMut() -> i32 + '_ {
    let mut next = codes.iter();
    move || *next.next().expect("ran more attempts than scripted")
}

#[test]
fn once_runs_a_single_attempt_without_banners() {
    let mut out = Vec::new();
    let code = run_attempts(Policy::Once, &mut out, scripted(&[5]));

    assert_eq!(code, 5);
    assert!(out.is_empty());
}

#[test]
fn unlimited_retry_keeps_going_until_success() {
    let policy = Policy::Retry {
        max_attempts: None,
        delay: Duration::ZERO,
    };
    let mut out = Vec::new();
    let code = run_attempts(policy, &mut out, scripted(&[1, 2, 3, 0]));
    let text = String::from_utf8(out).expect("utf8");

    assert_eq!(code, 0);
    assert!(text.contains("=== Attempt 4 ==="));
    assert!(text.contains("=== Attempt 3 ruined (exit 3), trying again... ==="));
    assert!(!text.contains("ruined ==="));
}

#[test]
fn restart_reports_only_success() {
    let policy = Policy::Restart {
        delay: Duration::ZERO,
    };
    let mut out = Vec::new();
    let code = run_attempts(policy, &mut out, scripted(&[1, 137, 0]));
    let text = String::from_utf8(out).expect("utf8");

    assert_eq!(code, 0);
    assert_eq!(text.matches("=== Starting: ").count(), 3);
    assert!(text.contains("=== Failed with exit 137, restarting in 0s... ==="));
}

#[test]
fn after_attempt_decisions() {
    let delay = Duration::from_millis(10);
    let limited = Policy::Retry {
        max_attempts: Some(2),
        delay,
    };
    let unlimited = Policy::Retry {
        max_attempts: None,
        delay,
    };

    assert_eq!(Policy::Once.after_attempt(1, 0), Step::Complete(0));
    assert_eq!(Policy::Once.after_attempt(1, 2), Step::Complete(2));
    assert_eq!(limited.after_attempt(1, 2), Step::Again(delay));
    assert_eq!(limited.after_attempt(2, 2), Step::Complete(2));
    assert_eq!(limited.after_attempt(2, 0), Step::Complete(0));
    assert_eq!(unlimited.after_attempt(500, 1), Step::Again(delay));
    assert_eq!(Policy::restart().after_attempt(9, 1), Step::Again(RESTART_DELAY));
}

#[test]
fn child_args_carry_policy_and_command() {
    let policy = Policy::Retry {
        max_attempts: Some(3),
        delay: Duration::from_millis(250),
    };
    let args = ChildArgs::new("/state".into(), 7, "/bin/sh", "echo 'a b'", policy);

    assert_eq!(args.policy(), policy);

    let argv = args.to_args();
    assert_eq!(argv.first().map(|a| a.as_os_str()), Some(OsStr::new("supervise")));
    assert_eq!(argv.last().map(|a| a.as_os_str()), Some(OsStr::new("echo 'a b'")));
    assert_eq!(argv[argv.len() - 2], "--");

    let unlimited = Policy::Retry {
        max_attempts: None,
        delay: Duration::ZERO,
    };
    assert_eq!(
        ChildArgs::new("/state".into(), 1, "/bin/sh", "true", unlimited).policy(),
        unlimited
    );
}

#[test]
fn exit_code_follows_shell_conventions() {
    assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
    assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    assert_eq!(EXIT_SPAWN_FAILED, 127);
}

#[test]
fn log_file_names_sort_by_start() {
    let at = datetime!(2026-01-02 03:04:05 UTC);
    assert_eq!(log_file_name(7, at), "20260102-030405-7.log");
}
