use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use icd_commands::Session;
use icd_config::{FATAL_EXIT_CODE, default_config_path};
use icd_runner::Runner;

/// Client for the WHO ICD-11 API plus local ICD-10 to ICD-11 mapping.
///
/// Run without a command for the command list.
#[derive(Parser, Debug)]
#[command(name = "icd11", version, about)]
struct Cli {
    /// More logging on stderr (-v debug, -vv trace with raw responses)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file [default: icd11.cfg beside the executable]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command to run
    #[arg(value_name = "COMMAND")]
    command: Option<String>,

    /// Arguments of the command
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// `RUST_LOG` wins; otherwise the level follows `-v`.
fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot initialise logging: {}", e))
}

fn run(cli: Cli) -> Result<i32> {
    init_logging(cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    debug!(config = %config_path.display(), "starting");

    let mut runner = Runner::new(Session::new(config_path)).context("command table is inconsistent")?;
    Ok(runner.run(cli.command.as_deref(), &cli.args))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let status = match run(cli) {
        Ok(status) => status,
        Err(err) => {
            println!("error: {:#}", err);
            FATAL_EXIT_CODE
        }
    };
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn command_and_arguments_are_passed_through() {
        let cli = Cli::try_parse_from(["icd11", "-vv", "--config", "x.cfg", "map", "F00.0"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.cfg")));
        assert_eq!(cli.command.as_deref(), Some("map"));
        assert_eq!(cli.args, vec!["F00.0".to_string()]);
    }

    #[test]
    fn dash_is_an_ordinary_argument() {
        let cli = Cli::try_parse_from(["icd11", "mapfile", "codes.txt", "-"]).unwrap();
        assert_eq!(cli.args, vec!["codes.txt".to_string(), "-".to_string()]);
    }

    #[test]
    fn bare_invocation_has_no_command() {
        let cli = Cli::try_parse_from(["icd11"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(cli.args.is_empty());
    }
}
