//! CLI command definitions using clap.
//!
//! - perform: run one or every model
//! - check: resolve stages without running anything
//! - ledger: show a model's retention ledger

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// backr - config driven backups
#[derive(Parser, Debug)]
#[command(name = "backr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging, mirrored to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run backups
    Perform {
        /// Only run this model
        #[arg(short, long)]
        model: Option<String>,

        /// Run all selected models concurrently
        #[arg(long)]
        parallel: bool,
    },

    /// Validate configuration and resolve every stage
    Check {
        /// Only check this model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print the retention ledger of a model
    Ledger {
        /// Model name
        model: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["backr"]).is_err());
    }

    #[test]
    fn test_perform_defaults() {
        let cli = Cli::try_parse_from(["backr", "perform"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Perform {
                model: None,
                parallel: false
            }
        );
        assert!(!cli.is_verbose());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_perform_with_model_and_parallel() {
        let cli = Cli::try_parse_from(["backr", "perform", "-m", "shop", "--parallel"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Perform {
                model: Some("shop".to_string()),
                parallel: true
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["backr", "check", "-v", "-c", "/etc/backr/backr.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/etc/backr/backr.yml")));
        assert_eq!(cli.command, Commands::Check { model: None });
    }

    #[test]
    fn test_ledger_requires_model() {
        assert!(Cli::try_parse_from(["backr", "ledger"]).is_err());
        let cli = Cli::try_parse_from(["backr", "ledger", "shop"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Ledger {
                model: "shop".to_string()
            }
        );
    }
}
