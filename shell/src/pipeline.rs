//! Compiling a command line into a validated [`Pipeline`].

use crate::config::MAX_STAGES;
use crate::error::ParseError;
use crate::parser::{self, Stage};
use crate::redirect::{self, RedirectionTarget};

/// An ordered sequence of stages joined by pipes.
///
/// A pipeline is built fresh for every input line, owns its stages, and is
/// dropped once its processes have been reaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline<'a> {
    line: &'a str,
    stages: Vec<Stage<'a>>,
    pipe_marks: usize,
    merge_stderr: bool,
    redirect: Option<RedirectionTarget>,
}

impl<'a> Pipeline<'a> {
    /// Compile and validate a command line.
    ///
    /// The redirection clause is resolved first (this may create the output
    /// file), then the rest of the line is split into stages and tokenized.
    /// Nothing is spawned: an `Ok` pipeline is ready for
    /// [`process::run`](crate::process::run).
    pub fn compile(line: &'a str) -> Result<Self, ParseError> {
        let resolved = redirect::resolve(line)?;
        let raw = parser::split_stages(resolved.command);
        let stages = raw.stages.into_iter().filter_map(parser::tokenize).collect();

        let pipeline = Self {
            line,
            stages,
            pipe_marks: raw.pipe_count,
            merge_stderr: raw.merge_stderr,
            redirect: resolved.target,
        };
        tracing::debug!(
            programs = ?pipeline.stages.iter().map(Stage::program).collect::<Vec<_>>(),
            pipes = pipeline.pipe_marks,
            merge_stderr = pipeline.merge_stderr,
            redirect = pipeline.redirect.is_some(),
            "compiled command line"
        );
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check the structural invariants; calling it again gives the same answer.
    ///
    /// - no stage has more than [`MAX_ARGS`](crate::config::MAX_ARGS) words;
    /// - when the line has pipes, there is exactly one more stage than pipes;
    /// - there are between 1 and [`MAX_STAGES`] stages.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.stages.iter().any(Stage::overflows) {
            return Err(ParseError::TooManyArguments);
        }
        if self.pipe_marks > 0 && self.stages.len() != self.pipe_marks + 1 {
            return Err(ParseError::MissingCommand);
        }
        if self.stages.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        if self.stages.len() > MAX_STAGES {
            return Err(ParseError::TooManyStages);
        }
        Ok(())
    }

    /// The command line exactly as entered.
    pub fn line(&self) -> &'a str {
        self.line
    }

    pub fn stages(&self) -> &[Stage<'a>] {
        &self.stages
    }

    /// Pipes needed to join the stages.
    pub fn pipe_count(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    /// Whether `|&` was used: every writer's stderr goes into its pipe.
    pub fn merge_stderr(&self) -> bool {
        self.merge_stderr
    }

    /// Output file of the last stage, if any.
    pub fn redirect(&self) -> Option<&RedirectionTarget> {
        self.redirect.as_ref()
    }
}
