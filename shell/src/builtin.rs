use crate::command::ExitCode;
use crate::env::Environment;
use crate::parser::PIPE;
use crate::redirect::REDIRECT;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They never take part in a
/// pipeline and never see a redirection.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is reported as `Error: <message>` and completes with status 1.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Run `line` as a built-in if it names one.
///
/// Returns `None` when the line is not a built-in: its first word is not a
/// known name, or it contains a pipe or redirect and thus belongs to the
/// pipeline engine.
pub(crate) fn run_builtin(
    line: &str,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    env: &mut Environment,
) -> Option<Result<ExitCode>> {
    if line.contains([PIPE, REDIRECT]) {
        return None;
    }
    let mut words = line.split_whitespace();
    let name = words.next()?;
    let args: Vec<&str> = words.collect();

    let result = match name {
        n if n == Exit::name() => invoke::<Exit>(&args, stdout, stderr, env),
        n if n == Pwd::name() => invoke::<Pwd>(&args, stdout, stderr, env),
        n if n == Cd::name() => invoke::<Cd>(&args, stdout, stderr, env),
        n if n == Sls::name() => invoke::<Sls>(&args, stdout, stderr, env),
        _ => return None,
    };
    Some(result)
}

fn invoke<T: BuiltinCommand>(
    args: &[&str],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode> {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => match cmd.execute(stdout, stderr, env) {
            Ok(code) => Ok(code),
            Err(e) => {
                writeln!(stderr, "Error: {e}")?;
                Ok(1)
            }
        },
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                stdout.write_all(output.as_bytes())?;
                Ok(0)
            }
            Err(()) => {
                stderr.write_all(output.as_bytes())?;
                Ok(1)
            }
        },
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => env
                .get_var("HOME")
                .map(PathBuf::from)
                .context("cannot cd into directory")?,
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir).context("cannot cd into directory")?;
        env::set_current_dir(&canonical).context("cannot cd into directory")?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the entries of the current directory with their sizes.
pub struct Sls {}

impl BuiltinCommand for Sls {
    fn name() -> &'static str {
        "sls"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let entries = fs::read_dir(&env.current_dir).context("cannot open directory")?;
        let mut listing = Vec::new();
        for entry in entries {
            let entry = entry.context("cannot open directory")?;
            // Follow symlinks for the size, like stat(2).
            let size = fs::metadata(entry.path()).map(|m| m.len()).unwrap_or(0);
            listing.push((entry.file_name(), size));
        }
        listing.sort();

        for (name, size) in listing {
            writeln!(stdout, "{} ({} bytes)", name.to_string_lossy(), size)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit shell process
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stderr, "Bye...")?;
        env.should_exit = true;
        Ok(0)
    }
}
