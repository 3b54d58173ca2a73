//! Errors raised while compiling and spawning a pipeline.

use nix::errno::Errno;
use std::ffi::NulError;
use thiserror::Error;

/// A command line that cannot be turned into a pipeline.
///
/// Every variant is detected before any process is created. The display text
/// is the user-facing message; the interpreter prefixes it with `Error: `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A redirection or pipe with no program in front of it, or an empty
    /// stage produced by a malformed pipe sequence (`a || b`, `a |`).
    #[error("missing command")]
    MissingCommand,

    /// An output redirection with no file after it.
    #[error("no outputfile")]
    NoOutputFile,

    /// An output redirection followed by more pipeline stages.
    #[error("mislocated output redirection")]
    MislocatedRedirection,

    /// The redirection target could not be created or truncated.
    #[error("cannot open output file")]
    CannotOpenOutputFile,

    /// A stage with more than [`MAX_ARGS`](crate::config::MAX_ARGS) words.
    #[error("too many process arguments")]
    TooManyArguments,

    /// A pipeline with more than [`MAX_STAGES`](crate::config::MAX_STAGES) stages.
    #[error("too many process commands")]
    TooManyStages,
}

/// A failure while building or reaping the process graph.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("pipe: {0}")]
    Pipe(Errno),

    #[error("fork: {0}")]
    Fork(Errno),

    #[error("waitpid: {0}")]
    Wait(Errno),

    /// An argument or output path containing a NUL byte cannot reach `execvp`.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] NulError),
}

impl SpawnError {
    /// Whether the shell itself must stop.
    ///
    /// Only a failed `fork` is fatal; anything else aborts the current command.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpawnError::Fork(_))
    }
}
