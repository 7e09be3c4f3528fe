use clap::Parser;
use std::process::ExitCode;
use tidysort::cli::{self, Args, EXIT_FATAL, EXIT_OK};
use tidysort::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over -v; logs go to stderr
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let outcome = match &args.create_config {
        Some(path) => cli::create_config(path.as_deref()).map(|()| EXIT_OK),
        None => cli::run(&args).map(|report| cli::exit_code(&report, args.strict)),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            OutputFormatter::error(&format!("{:#}", e));
            ExitCode::from(EXIT_FATAL)
        }
    }
}
