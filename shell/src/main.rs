use argh::FromArgs;
use sshell::Interpreter;
use sshell::config::{Config, DEFAULT_PROMPT, LOG_ENV};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Simple shell running pipelines of up to four programs.
struct Args {
    /// text printed before each command line
    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    prompt: String,

    /// tracing filter directive; overrides SSHELL_LOG
    #[argh(option)]
    log: Option<String>,
}

fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_env(LOG_ENV).ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    init_tracing(args.log.as_deref());

    let mut shell = Interpreter::new(Config::with_prompt(args.prompt));
    match shell.repl() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
