use crate::builtin;
use crate::command::Completion;
use crate::config::Config;
use crate::env::Environment;
use crate::pipeline::Pipeline;
use crate::process;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};

/// What the read loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A minimal shell that runs built-ins and pipelines of external programs.
///
/// Every line is either a built-in (`pwd`, `cd`, `sls`, `exit`) or compiled
/// into a [`Pipeline`] and run by [`process::run`]. Either way one completion
/// record is printed on stderr.
///
/// Example
/// ```
/// use sshell::{Flow, Interpreter};
/// let mut sh = Interpreter::default();
/// let flow = sh.execute_line("true").unwrap();
/// assert_eq!(flow, Flow::Continue);
/// ```
pub struct Interpreter {
    env: Environment,
    config: Config,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self {
            env: Environment::new(),
            config,
        }
    }

    /// Handle one line of input, reporting on the process's stdout and stderr.
    ///
    /// Returns an error only when the shell cannot go on (a failed `fork`).
    pub fn execute_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        self.execute_line_with_output(line, &mut io::stdout(), &mut io::stderr())
    }

    /// Read-eval loop until `exit` or end of input.
    ///
    /// A terminal gets a line editor with history; any other input is read
    /// line by line and echoed after the prompt.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        if self.config.echo_input {
            self.repl_piped()
        } else {
            self.repl_interactive()
        }
    }

    fn repl_interactive(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if self.execute_line(&line)? == Flow::Exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    fn repl_piped(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buf = Vec::new();

        loop {
            write!(stdout, "{}", self.config.prompt)?;
            stdout.flush()?;

            buf.clear();
            if stdin.lock().read_until(b'\n', &mut buf).context("reading command line")? == 0 {
                break;
            }
            // Bytes that are not UTF-8 become U+FFFD; the line still runs.
            let line = String::from_utf8_lossy(&buf);
            let trimmed = line.strip_suffix('\n').unwrap_or(&line);
            writeln!(stdout, "{trimmed}")?;
            stdout.flush()?;

            if self.execute_line(trimmed)? == Flow::Exit {
                break;
            }
        }

        Ok(())
    }

    fn execute_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> anyhow::Result<Flow> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }

        if let Some(result) = builtin::run_builtin(line, stdout, stderr, &mut self.env) {
            let code = result?;
            writeln!(stderr, "{}", Completion::new(line, vec![code]))?;
            return Ok(if self.env.should_exit {
                Flow::Exit
            } else {
                Flow::Continue
            });
        }

        let pipeline = match Pipeline::compile(line) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                writeln!(stderr, "Error: {e}")?;
                return Ok(Flow::Continue);
            }
        };

        // Children inherit our stdout; nothing buffered may leak into them.
        stdout.flush()?;
        io::stdout().flush()?;

        match process::run(&pipeline) {
            Ok(completion) => writeln!(stderr, "{completion}")?,
            Err(e) if e.is_fatal() => {
                tracing::error!(line, error = %e, "cannot continue");
                return Err(e.into());
            }
            Err(e) => writeln!(stderr, "Error: {e}")?,
        }
        Ok(Flow::Continue)
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default prompt.
    fn default() -> Self {
        Self::new(Config::default())
    }
}
