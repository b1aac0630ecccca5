//! Command-line interface for the adapter daemon.

use camino::Utf8PathBuf;
use clap::Parser;

use crate::telemetry::LogFormat;

/// Debug adapter daemon: serves one protocol session over TCP or stdio.
#[derive(Debug, Parser)]
#[command(name = "tetherd", version, about)]
pub struct Cli {
    /// Listen on this loopback TCP port and serve exactly one client.
    /// Without it the inherited standard streams are the transport.
    #[arg(long)]
    pub port: Option<u16>,

    /// Mirror every packet sent and received into this file.
    #[arg(long, value_name = "PATH")]
    pub trace_file: Option<Utf8PathBuf>,

    /// Telemetry filter expression (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Telemetry output format.
    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    /// Pause at startup until a signal arrives, so a debugger can attach
    /// to the adapter itself.
    #[arg(long)]
    pub wait_for_debugger: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_to_stdio_transport_and_compact_logs() {
        let cli = Cli::try_parse_from(["tetherd"]).expect("parse");
        assert!(cli.port.is_none());
        assert!(cli.trace_file.is_none());
        assert_eq!(cli.log_filter, "info");
        assert_eq!(cli.log_format, LogFormat::Compact);
        assert!(!cli.wait_for_debugger);
    }

    #[test]
    fn accepts_a_full_flag_set() {
        let cli = Cli::try_parse_from([
            "tetherd",
            "--port",
            "4711",
            "--trace-file",
            "/tmp/adapter.trace",
            "--log-filter",
            "debug",
            "--log-format",
            "json",
            "--wait-for-debugger",
        ])
        .expect("parse");
        assert_eq!(cli.port, Some(4711));
        assert_eq!(cli.trace_file.as_deref().map(|p| p.as_str()), Some("/tmp/adapter.trace"));
        assert_eq!(cli.log_filter, "debug");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.wait_for_debugger);
    }

    #[rstest]
    #[case::non_numeric_port(&["tetherd", "--port", "not-a-port"])]
    #[case::unknown_format(&["tetherd", "--log-format", "xml"])]
    fn rejects_invalid_flags(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args.iter().copied()).is_err());
    }
}
