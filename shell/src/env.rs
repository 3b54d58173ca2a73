use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the process state used by the interpreter.
///
/// The environment contains:
/// - `current_dir`: the working directory, inherited by every spawned stage.
/// - `should_exit`: a flag that the REPL loop checks after each built-in.
///
/// Note: fields are public for simplicity, as the built-ins update them in place.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// `current_dir` comes from `std::env::current_dir()`, falling back to `.`.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            should_exit: false,
        }
    }

    /// Get the value of a process environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
