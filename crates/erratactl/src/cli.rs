//! Command-line surface for erratactl

use clap::{Parser, Subcommand};
use errata_common::ErrorCategory;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "erratactl")]
#[command(about = "Errata - collect and export deduplicated error reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database file (overrides storage.path from the config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.config/errata/config.toml, then /etc/errata/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one occurrence of an error
    Report {
        /// frontend, backend or task
        #[arg(long)]
        category: ErrorCategory,

        /// Short human-readable description
        #[arg(long)]
        message: String,

        /// Full stack trace
        #[arg(long, default_value = "")]
        traceback: String,

        /// Context document as JSON (default: {})
        #[arg(long)]
        context: Option<String>,
    },

    /// List records that have not been exported yet
    Unreported {
        /// Print a JSON array instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Flag records as exported
    MarkReported {
        /// Record ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Show or edit configuration
    Config {
        /// Set a configuration value (key=value)
        #[arg(long)]
        set: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let cli = Cli::try_parse_from([
            "erratactl",
            "report",
            "--category",
            "backend",
            "--message",
            "Test Error",
            "--context",
            r#"{"server": {"host": "localhost"}}"#,
        ])
        .unwrap();

        match cli.command {
            Commands::Report {
                category,
                message,
                traceback,
                context,
            } => {
                assert_eq!(category, ErrorCategory::Backend);
                assert_eq!(message, "Test Error");
                assert_eq!(traceback, "");
                assert!(context.is_some());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let result = Cli::try_parse_from([
            "erratactl",
            "report",
            "--category",
            "database",
            "--message",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_db_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["erratactl", "unreported", "--json", "--db", "/tmp/r.db"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/r.db")));
        assert!(matches!(cli.command, Commands::Unreported { json: true }));
    }

    #[test]
    fn test_mark_reported_requires_ids() {
        assert!(Cli::try_parse_from(["erratactl", "mark-reported"]).is_err());

        let cli = Cli::try_parse_from(["erratactl", "mark-reported", "3", "7"]).unwrap();
        match cli.command {
            Commands::MarkReported { ids } => assert_eq!(ids, vec![3, 7]),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
