use crate::support::{job, write_ledger};
use bj_cli::retry::select_target;
use bj_cli::{JobError, Store};
use tempfile::tempdir;

#[test]
fn picks_most_recent_failure() {
    let dir = tempdir().expect("tempdir");
    write_ledger(
        dir.path(),
        &[
            job(1, Some(2), 40),
            job(2, Some(5), 20),
            job(3, Some(0), 10),
            job(4, None, 5),
        ],
    );
    let store = Store::open(dir.path()).expect("open");

    let target = select_target(&store, None).expect("select").expect("target");
    assert_eq!(target.id, 2);
}

#[test]
fn nothing_to_retry_is_not_an_error() {
    let dir = tempdir().expect("tempdir");
    write_ledger(dir.path(), &[job(1, Some(0), 10), job(2, None, 5)]);
    let store = Store::open(dir.path()).expect("open");

    assert!(select_target(&store, None).expect("select").is_none());
}

#[test]
fn explicit_id_must_have_failed() {
    let dir = tempdir().expect("tempdir");
    write_ledger(
        dir.path(),
        &[job(1, Some(0), 30), job(2, None, 20), job(3, Some(-1), 10)],
    );
    let store = Store::open(dir.path()).expect("open");

    assert!(matches!(
        select_target(&store, Some(1)),
        Err(JobError::AlreadySucceeded(1))
    ));
    assert!(matches!(
        select_target(&store, Some(2)),
        Err(JobError::StillRunning(2))
    ));
    assert!(matches!(
        select_target(&store, Some(9)),
        Err(JobError::NotFound(9))
    ));

    let target = select_target(&store, Some(3)).expect("select").expect("target");
    assert_eq!(target.command, "echo 3");
}
