pub mod app_error;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod output;
pub mod retry;
pub mod store;
pub mod supervisor;
pub mod version;

pub use error::JobError;
pub use model::{Job, JobStatus};
pub use store::Store;
pub use supervisor::{Policy, Supervisor};

pub fn run() -> i32 {
    match cli::run_cli() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            err.code()
        }
    }
}
