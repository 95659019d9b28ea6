mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "shmwire", version, about = "Structured worker messaging CLI")]
struct Cli {
    /// Output format for printed frames.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

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
    use shmwire_codec::WireFormat;

    use super::*;

    #[test]
    fn parses_echo_with_segment() {
        let cli = Cli::try_parse_from([
            "shmwire",
            "echo",
            "--wire",
            "bson",
            "--shmem-size",
            "65536",
            "--count",
            "2",
        ])
        .expect("echo args should parse");

        let Command::Echo(args) = cli.command else {
            panic!("expected echo");
        };
        assert_eq!(args.codec.wire, WireFormat::Binary);
        assert_eq!(args.codec.shmem_size, 65536);
        assert_eq!(args.count, Some(2));
    }

    #[test]
    fn rejects_unknown_wire_format() {
        let err = Cli::try_parse_from(["shmwire", "encode", "--wire", "yaml"])
            .expect_err("unknown wire format should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_inspect_subcommand() {
        let cli = Cli::try_parse_from(["shmwire", "--format", "json", "inspect", "--file", "x.bin"])
            .expect("inspect args should parse");
        assert!(matches!(cli.command, Command::Inspect(_)));
    }
}
