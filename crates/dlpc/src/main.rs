mod cmd;
mod device;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use dlpc_control::ControllerConfig;

use crate::cmd::{Command, Context};
use crate::exit::{config_error, CliResult};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "dlpc", version, about = "DLPC1438 exposure controller CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON configuration file.
    #[arg(long, value_name = "FILE", env = "DLPC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Run against an in-memory simulated controller.
    #[arg(long, global = true)]
    simulate: bool,

    /// Register bus device node (overrides config).
    #[arg(long, value_name = "PATH", global = true)]
    i2c: Option<PathBuf>,

    /// Stream bus device node (overrides config).
    #[arg(long, value_name = "PATH", global = true)]
    spi: Option<PathBuf>,

    /// Settle delay in milliseconds (overrides config; 0 when simulating).
    #[arg(long, value_name = "MS", global = true)]
    settle_ms: Option<u64>,

    /// Simulated controller drops off the bus after N exposures (with --simulate).
    #[arg(long, value_name = "N", global = true, hide = true)]
    simulate_drop_after: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn load_config(&self) -> CliResult<ControllerConfig> {
        let mut config = match &self.config {
            Some(path) => ControllerConfig::from_json_file(path).map_err(config_error)?,
            None => ControllerConfig::default(),
        };
        if let Some(path) = &self.i2c {
            config.i2c_path = path.clone();
        }
        if let Some(path) = &self.spi {
            config.spi_path = path.clone();
        }
        match self.settle_ms {
            Some(ms) => config.settle_delay_ms = ms,
            None if self.simulate => {
                config.settle_delay_ms = 0;
                config.pattern_settle_ms = 0;
            }
            None => {}
        }
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = cli.load_config().and_then(|config| {
        let ctx = Context {
            config,
            config_path: cli.config.clone(),
            simulate: cli.simulate,
            simulate_drop_after: cli.simulate_drop_after,
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expose_subcommand() {
        let cli = Cli::try_parse_from([
            "dlpc",
            "--simulate",
            "expose",
            "--dark",
            "32",
            "--exposed",
            "512",
            "--repeat",
            "2",
        ])
        .expect("expose args should parse");

        assert!(cli.simulate);
        match cli.command {
            Command::Expose(args) => {
                assert_eq!(args.dark, Some(32));
                assert_eq!(args.repeat, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_file_with_explicit_pattern() {
        let err = Cli::try_parse_from([
            "dlpc",
            "stream",
            "--file",
            "frame.bin",
            "--pattern",
            "checker",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_buffer_out_of_range() {
        let err = Cli::try_parse_from(["dlpc", "stream", "--buffer", "2"])
            .expect_err("buffer 2 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn simulation_zeroes_settle_delay() {
        let cli = Cli::try_parse_from(["dlpc", "--simulate", "prepare"]).expect("should parse");
        assert_eq!(cli.load_config().expect("config").settle_delay_ms, 0);

        let cli = Cli::try_parse_from(["dlpc", "--simulate", "--settle-ms", "5", "prepare"])
            .expect("should parse");
        assert_eq!(cli.load_config().expect("config").settle_delay_ms, 5);
    }

    #[test]
    fn parses_mode_names() {
        let cli = Cli::try_parse_from(["dlpc", "mode", "external-print"]).expect("should parse");
        assert!(matches!(
            cli.command,
            Command::Mode(cmd::ModeArgs {
                mode: Some(cmd::ModeName::ExternalPrint)
            })
        ));
    }
}
