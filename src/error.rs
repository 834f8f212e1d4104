use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;
use trailpe::FormatError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("couldn't {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path:   PathBuf,
        source: io::Error,
    },

    #[error("invalid manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("output directory {} contains the app directory", .0.display())]
    OutputContainsApp(PathBuf),

    #[error("runtime binary not found: {}", .0.display())]
    MissingRuntime(PathBuf),

    #[error("no runtime version configured")]
    MissingRuntimeVersion,

    #[error("not a supported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("not a supported architecture: {0}")]
    UnsupportedArch(String),

    #[error("invalid pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        source:  glob::PatternError,
    },

    #[error("couldn't walk {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },

    #[error("failed to install app, package dir left for debugging at {}:\n{stderr}", staged.display())]
    Install { staged: PathBuf, stderr: String },

    #[error("{program} exited with {status}:\n{stderr}")]
    Command {
        program: String,
        status:  ExitStatus,
        stderr:  String,
    },

    #[error("couldn't edit resources of {}: {message}", path.display())]
    Resources { path: PathBuf, message: String },

    #[error("offset {offset} doesn't fit into a {width} byte placeholder")]
    PlaceholderTooNarrow { offset: u64, width: usize },

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl Error {
    pub fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io {
            action,
            path,
            source,
        }
    }
}
