//! `worldvisor` binary: CLI, logging, runtime, exit code.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use worldvisor::{
    ExitCode, LogWriter, ServerConfig, Subscribe, SupervisorBuilder, DEFAULT_CONFIG_PATH,
};

/// World server process supervisor.
#[derive(Parser, Debug)]
#[command(name = "worldvisor", about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print version information and exit
    #[arg(short = 'v', long)]
    version: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(usage_exit_code(&e));
        }
    };
    if cli.version {
        println!("worldvisor {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let cfg = match ServerConfig::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "hint: pass the configuration file with -c <FILE> (default: {DEFAULT_CONFIG_PATH})"
            );
            std::process::exit(ExitCode::Error.code());
        }
    };

    init_tracing(&cfg.log.level);

    let code = match run(cfg) {
        Ok(code) => code,
        Err(e) => {
            error!(error = format!("{e:#}"), "worldvisor failed");
            ExitCode::Error
        }
    };
    std::process::exit(code.code());
}

/// Argument errors exit with the error code; clap's own 2 would read as "restart".
fn usage_exit_code(e: &clap::Error) -> i32 {
    if e.use_stderr() {
        ExitCode::Error.code()
    } else {
        0
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cfg: ServerConfig) -> anyhow::Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("worldvisor")
        .build()
        .context("cannot start async runtime")?;

    let result = runtime.block_on(async move {
        let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
        SupervisorBuilder::new(cfg)
            .with_subscribers(subscribers)
            .build()
            .run()
            .await
    });

    // The console thread may still be parked in a read; it must not hold the exit.
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_argument_is_an_error_not_a_restart() {
        let err = Cli::try_parse_from(["worldvisor", "--bogus"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), ExitCode::Error.code());
        assert_ne!(usage_exit_code(&err), ExitCode::Restart.code());
    }

    #[test]
    fn missing_config_value_is_an_error() {
        let err = Cli::try_parse_from(["worldvisor", "-c"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), ExitCode::Error.code());
    }

    #[test]
    fn help_exits_cleanly() {
        let err = Cli::try_parse_from(["worldvisor", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 0);
    }

    #[test]
    fn config_and_version_flags_parse() {
        let cli = Cli::try_parse_from(["worldvisor", "-c", "realm.toml", "-v"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("realm.toml"));
        assert!(cli.version);
    }
}
