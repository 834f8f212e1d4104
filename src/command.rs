use std::{
    path::PathBuf,
    process::{Command, Output},
};

use crate::error::{Error, Result};

/// Location of `program` on `PATH`, if it is installed.
pub fn find_tool(program: &str) -> Option<PathBuf> { which::which(program).ok() }

/// Run `command` to completion, capturing its output. A non-zero exit is an
/// error carrying the captured stderr.
pub fn run(mut command: Command) -> Result<Output> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .output()
        .map_err(Error::io("run", PathBuf::from(&program)))?;
    if !output.status.success() {
        return Err(Error::Command {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}
