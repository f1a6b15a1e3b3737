//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Metanorma collection assembler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Output directory path (overrides `[build].output`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (default: collection.toml)
    #[arg(short = 'C', long, default_value = "collection.toml")]
    pub config: PathBuf,

    /// Worker pool size (overrides `[build].parallel`)
    #[arg(short = 'j', long)]
    pub parallel: Option<usize>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve cross-references and write every output of the collection
    Build,

    /// Split one document into section fragments and write their manifest
    Split {
        /// Semantic XML of the document to split
        input: PathBuf,

        /// Identifier of the document
        #[arg(short, long)]
        identifier: String,

        /// Flavor recorded in the manifest
        #[arg(long, default_value = "generic")]
        flavor: String,
    },
}

impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build)
    }

    pub const fn is_split(&self) -> bool {
        matches!(self.command, Commands::Split { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::parse_from(["mn-collection", "-C", "coll.toml", "-j", "4", "build"]);
        assert!(cli.is_build());
        assert_eq!(cli.config, PathBuf::from("coll.toml"));
        assert_eq!(cli.parallel, Some(4));
        assert_eq!(cli.output, None);
    }

    #[test]
    fn test_parse_split() {
        let cli = Cli::parse_from([
            "mn-collection",
            "-o",
            "out",
            "split",
            "big.xml",
            "--identifier",
            "ISO 9",
        ]);
        assert!(cli.is_split());
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Split {
                input,
                identifier,
                flavor,
            } => {
                assert_eq!(input, PathBuf::from("big.xml"));
                assert_eq!(identifier, "ISO 9");
                assert_eq!(flavor, "generic");
            }
            Commands::Build => panic!("expected split"),
        }
    }
}
