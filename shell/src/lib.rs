//! A small interactive shell that runs pipelines of external programs.
//!
//! A command line is compiled into a [`pipeline::Pipeline`] of at most
//! [`config::MAX_STAGES`] stages, with an optional output redirection on the
//! last one, and then realized by [`process::run`] as one forked child per
//! stage joined by pipes. Each finished line is reported as a
//! [`command::Completion`] record carrying one exit status per stage.
//!
//! The main entry point is [`Interpreter`], which also provides the `pwd`,
//! `cd`, `sls` and `exit` built-ins and the read-eval loop.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod interpreter;
pub mod parser;
pub mod pipeline;
pub mod process;
pub mod redirect;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Flow, Interpreter};
