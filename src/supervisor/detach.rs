use crate::error::{JobError, Result};
use nix::unistd::setsid;
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

pub fn new_session(cmd: &mut Command) -> &mut Command {
    // SAFETY: setsid(2) is async-signal-safe and the closure touches no
    // state shared with the parent.
    unsafe {
        cmd.pre_exec(|| setsid().map(drop).map_err(io::Error::from));
    }
    cmd
}

pub(crate) fn detached_command(
    program: &Path,
    args: &[OsString],
    working_dir: &Path,
    log: File,
) -> Result<Command> {
    let stderr = log
        .try_clone()
        .map_err(|e| JobError::io("failed to duplicate log file handle", e))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));
    new_session(&mut cmd);

    Ok(cmd)
}
