use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(u64),

    #[error("job {0} already finished")]
    AlreadyTerminal(u64),

    #[error("job {0} already succeeded")]
    AlreadySucceeded(u64),

    #[error("job {0} is still running")]
    StillRunning(u64),

    #[error("job {0} has no PID recorded")]
    NoPid(u64),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Process {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl JobError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn process(context: impl Into<String>, source: impl Into<io::Error>) -> Self {
        Self::Process {
            context: context.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
