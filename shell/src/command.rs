use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// A process killed by a signal is reported as `128 + signal`, as POSIX shells do.
pub type ExitCode = i32;

/// The diagnostic line printed once a command line has finished.
///
/// Holds the line as entered and one status per stage, in stage order:
///
/// ```
/// use sshell::command::Completion;
/// let done = Completion::new("ls | wc -l", vec![0, 0]);
/// assert_eq!(done.to_string(), "+ completed 'ls | wc -l' [0][0]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub line: String,
    pub statuses: Vec<ExitCode>,
}

impl Completion {
    pub fn new(line: impl Into<String>, statuses: Vec<ExitCode>) -> Self {
        Self {
            line: line.into(),
            statuses,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+ completed '{}' ", self.line)?;
        for status in &self.statuses {
            write!(f, "[{status}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_status() {
        let done = Completion::new("doesnotexist123", vec![1]);
        assert_eq!(done.to_string(), "+ completed 'doesnotexist123' [1]");
    }

    #[test]
    fn test_statuses_in_stage_order() {
        let done = Completion::new("a | b | c", vec![2, 0, 141]);
        assert_eq!(done.to_string(), "+ completed 'a | b | c' [2][0][141]");
    }
}
