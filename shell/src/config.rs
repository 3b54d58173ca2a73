//! Limits and runtime settings of the shell.

use std::io::IsTerminal;

/// Maximum number of stages in one pipeline (three pipes).
pub const MAX_STAGES: usize = 4;

/// Maximum number of words in one stage, program name included.
pub const MAX_ARGS: usize = 16;

/// Prompt printed before every command line.
pub const DEFAULT_PROMPT: &str = "sshell@ucd$ ";

/// Environment variable holding the `tracing` filter directive.
pub const LOG_ENV: &str = "SSHELL_LOG";

/// Runtime settings of an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Text printed before each line is read.
    pub prompt: String,
    /// Echo every line read back to stdout after the prompt.
    ///
    /// Enabled when stdin is not a terminal, so a scripted session produces
    /// the same transcript an interactive one would.
    pub echo_input: bool,
}

impl Config {
    /// Settings with a custom prompt; input echo follows whether stdin is a terminal.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            echo_input: !std::io::stdin().is_terminal(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_prompt(DEFAULT_PROMPT)
    }
}
