//! CLI argument definitions using clap
//!
//! Commands:
//! - designsync init --config <path>
//! - designsync apply --config <path> --tenant <id> --kind <kind> [--design <name>] [--version <v>]
//! - designsync inspect --config <path> --tenant <id> [--table <name>]
//! - designsync compare <a> <b>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// designsync - additive schema synchronization for versioned designs
#[derive(Parser, Debug)]
#[command(name = "designsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data and design directories
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./designsync.json")]
        config: PathBuf,
    },

    /// Synchronize one design into its tenant's schema
    Apply {
        /// Path to configuration file
        #[arg(long, default_value = "./designsync.json")]
        config: PathBuf,

        /// Tenant (study) identifier
        #[arg(long)]
        tenant: String,

        /// Design kind: survey or participant_properties
        #[arg(long, default_value = "survey")]
        kind: String,

        /// Survey activity id; ignored for participant properties
        #[arg(long)]
        design: Option<String>,

        /// Survey version to fetch
        #[arg(long)]
        version: Option<String>,

        /// Only log warnings and errors
        #[arg(long)]
        quiet: bool,
    },

    /// Print a tenant's tables as JSON
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./designsync.json")]
        config: PathBuf,

        /// Tenant (study) identifier
        #[arg(long)]
        tenant: String,

        /// Only this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Compare two design versions (-1, 0 or 1)
    Compare {
        a: String,
        b: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "designsync",
            "apply",
            "--tenant",
            "T1",
            "--design",
            "Daily",
            "--version",
            "1.1",
        ])
        .unwrap();

        match cli.command {
            Command::Apply {
                tenant,
                kind,
                design,
                version,
                quiet,
                ..
            } => {
                assert_eq!(tenant, "T1");
                assert_eq!(kind, "survey");
                assert_eq!(design.as_deref(), Some("Daily"));
                assert_eq!(version.as_deref(), Some("1.1"));
                assert!(!quiet);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from(["designsync", "compare", "1.0", "1.0.0"]).unwrap();
        assert!(matches!(cli.command, Command::Compare { .. }));
    }

    #[test]
    fn test_tenant_is_required() {
        assert!(Cli::try_parse_from(["designsync", "inspect"]).is_err());
    }
}
