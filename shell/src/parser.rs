//! Splitting a command line into pipeline stages and stages into words.
//!
//! Both steps work on borrowed slices of the original line: a [`Stage`] never
//! owns its words, it points into the text the user typed.

use crate::config::MAX_ARGS;

/// Pipe metacharacter joining two stages.
pub const PIPE: char = '|';

/// Pipe variant that also routes the writer's stderr into the pipe.
pub const ERROR_PIPE: &str = "|&";

/// One program invocation within a pipeline.
///
/// The first word is the program name; all words, the name included, form
/// the argument vector handed to `execvp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage<'a> {
    args: Vec<&'a str>,
    overflow: bool,
}

impl<'a> Stage<'a> {
    /// Program name (`argv[0]`).
    pub fn program(&self) -> &'a str {
        self.args[0]
    }

    /// Full argument vector, program name first.
    pub fn args(&self) -> &[&'a str] {
        &self.args
    }

    /// Whether the raw stage had more than [`MAX_ARGS`] words.
    ///
    /// Collection stops at the bound; the stage is kept so the validator can
    /// reject the whole pipeline.
    pub fn overflows(&self) -> bool {
        self.overflow
    }
}

/// Raw stage strings of a command line, before tokenizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStages<'a> {
    /// Non-blank stage strings in line order, surrounding whitespace kept.
    pub stages: Vec<&'a str>,
    /// Pipe metacharacters found in the line.
    pub pipe_count: usize,
    /// Set when `|&` appears anywhere in the line.
    pub merge_stderr: bool,
}

/// Split a command line (redirection clause already removed) on pipes.
///
/// Blank segments are dropped rather than kept as empty stages, so a
/// malformed sequence such as `a || b` or a trailing `|` shows up as a
/// mismatch between `stages.len()` and `pipe_count`.
///
/// `|&` is recorded as one pipeline-wide flag; it applies to every join.
pub fn split_stages(line: &str) -> RawStages<'_> {
    let stages = line
        .split(PIPE)
        .map(|segment| segment.strip_prefix('&').unwrap_or(segment))
        .filter(|segment| !segment.trim().is_empty())
        .collect();

    RawStages {
        stages,
        pipe_count: line.matches(PIPE).count(),
        merge_stderr: line.contains(ERROR_PIPE),
    }
}

/// Split one raw stage on runs of whitespace.
///
/// Returns `None` for a stage without any word, so a [`Stage`] always has a
/// program name. At most [`MAX_ARGS`] words
/// are collected; any further word marks the stage as overflowing.
pub fn tokenize(raw: &str) -> Option<Stage<'_>> {
    let mut words = raw.split_whitespace();
    let args: Vec<&str> = words.by_ref().take(MAX_ARGS).collect();
    if args.is_empty() {
        return None;
    }
    let overflow = words.next().is_some();
    Some(Stage { args, overflow })
}
