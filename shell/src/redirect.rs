//! Output redirection clause at the end of a command line.

use crate::error::ParseError;
use crate::parser::PIPE;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Redirect metacharacter.
pub const REDIRECT: char = '>';

/// Redirect variant that sends stderr to the file as well.
pub const ERROR_REDIRECT: &str = ">&";

/// Permission bits of a freshly created output file.
pub const OUTPUT_MODE: u32 = 0o644;

/// File receiving the last stage's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionTarget {
    /// Path as typed, leading whitespace removed.
    pub path: PathBuf,
    /// `>&`: stderr goes to the file together with stdout.
    pub merge_stderr: bool,
}

/// A command line split at its redirection clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<'a> {
    /// The part of the line before the redirect, safe to split on pipes.
    pub command: &'a str,
    pub target: Option<RedirectionTarget>,
}

/// Detect and check the redirection clause of `line`.
///
/// Lines without `>` come back untouched. Otherwise the line is split at the
/// first `>` (or `>&`) and the file part is validated: it must be present,
/// must not contain a pipe, and must be creatable. The file is created (or
/// truncated) here and closed again; the last stage reopens it.
pub fn resolve(line: &str) -> Result<Resolved<'_>, ParseError> {
    let Some(at) = line.find(REDIRECT) else {
        return Ok(Resolved {
            command: line,
            target: None,
        });
    };

    let command = &line[..at];
    if command.trim().is_empty() {
        return Err(ParseError::MissingCommand);
    }

    // Runs of redirect characters collapse into one: `>> out` writes to `out`.
    let merge_stderr = line[at..].starts_with(ERROR_REDIRECT);
    let file = if merge_stderr {
        line[at..].trim_start_matches([REDIRECT, '&'])
    } else {
        line[at..].trim_start_matches(REDIRECT)
    };

    let Some(path) = file.split_whitespace().next() else {
        return Err(ParseError::NoOutputFile);
    };
    if file.contains(PIPE) {
        return Err(ParseError::MislocatedRedirection);
    }

    let path = PathBuf::from(path);
    check_writable(&path)?;
    Ok(Resolved {
        command,
        target: Some(RedirectionTarget { path, merge_stderr }),
    })
}

fn check_writable(path: &Path) -> Result<(), ParseError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
        .map(drop)
        .map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "output file rejected");
            ParseError::CannotOpenOutputFile
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_no_redirect_passes_line_through() {
        let resolved = resolve("ls -l | wc").unwrap();
        assert_eq!(resolved.command, "ls -l | wc");
        assert_eq!(resolved.target, None);
    }

    #[test]
    fn test_stdout_redirect() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.txt");
        let line = format!("echo hi >   {}", path.display());

        let resolved = resolve(&line)?;
        assert_eq!(resolved.command, "echo hi ");
        let target = resolved.target.unwrap();
        assert_eq!(target.path, path);
        assert!(!target.merge_stderr);
        assert!(path.exists(), "target should be created by the check");
        Ok(())
    }

    #[test]
    fn test_error_redirect_truncates() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("log");
        fs::write(&path, "stale contents")?;
        let line = format!("ls nowhere >&{}", path.display());

        let resolved = resolve(&line)?;
        assert_eq!(resolved.command, "ls nowhere ");
        assert!(resolved.target.unwrap().merge_stderr);
        assert_eq!(fs::read_to_string(&path)?, "");
        Ok(())
    }

    #[test]
    fn test_repeated_redirect_characters_collapse() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out");

        let line = format!("echo hi >> {}", path.display());
        let resolved = resolve(&line)?;
        assert_eq!(resolved.command, "echo hi ");
        assert_eq!(resolved.target.unwrap().path, path);

        let line = format!("echo hi >&>& {}", path.display());
        let resolved = resolve(&line)?;
        let target = resolved.target.unwrap();
        assert_eq!(target.path, path);
        assert!(target.merge_stderr);

        assert!(path.exists());
        assert!(!dir.path().join(">").exists());
        assert_eq!(resolve("echo hi >>"), Err(ParseError::NoOutputFile));
        Ok(())
    }

    #[test]
    fn test_missing_command() {
        assert_eq!(resolve("> file"), Err(ParseError::MissingCommand));
        assert_eq!(resolve("   >& file"), Err(ParseError::MissingCommand));
    }

    #[test]
    fn test_no_output_file() {
        assert_eq!(resolve("echo hi >"), Err(ParseError::NoOutputFile));
        assert_eq!(resolve("echo hi >&   "), Err(ParseError::NoOutputFile));
    }

    #[test]
    fn test_mislocated_redirection() {
        assert_eq!(
            resolve("echo hi > file | grep hi"),
            Err(ParseError::MislocatedRedirection)
        );
    }

    #[test]
    fn test_cannot_open_output_file() {
        assert_eq!(
            resolve("echo hi > /nonexistent-dir-sshell/out.txt"),
            Err(ParseError::CannotOpenOutputFile)
        );
    }
}
