use crate::error::{JobError, Result};
use crate::model::Job;
use crate::store::Store;

pub fn select_target(store: &Store, id: Option<u64>) -> Result<Option<Job>> {
    let Some(id) = id else {
        return Ok(store.list()?.into_iter().find(Job::failed));
    };

    let job = store.get(id)?.ok_or(JobError::NotFound(id))?;
    match job.exit_code {
        None => Err(JobError::StillRunning(id)),
        Some(0) => Err(JobError::AlreadySucceeded(id)),
        Some(_) => Ok(Some(job)),
    }
}
