//! CLI argument definitions using clap
//!
//! Commands:
//! - aerokit check --config <path>
//! - aerokit validate --config <path> --class <name>
//! - aerokit skeleton --config <path> --class <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerokit - structure validation for document classes
#[derive(Parser, Debug)]
#[command(name = "aerokit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load every class definition and report definition errors
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokit.json")]
        config: PathBuf,
    },

    /// Validate JSON documents read from stdin, one per line
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokit.json")]
        config: PathBuf,

        /// Class the documents belong to
        #[arg(long)]
        class: String,
    },

    /// Print the default document of a class
    Skeleton {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokit.json")]
        config: PathBuf,

        /// Class to print
        #[arg(long)]
        class: String,
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
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["aerokit", "validate", "--class", "blog_post"]).unwrap();
        match cli.command {
            Command::Validate { config, class } => {
                assert_eq!(config, PathBuf::from("./aerokit.json"));
                assert_eq!(class, "blog_post");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_class_is_required() {
        assert!(Cli::try_parse_from(["aerokit", "skeleton"]).is_err());
    }
}
