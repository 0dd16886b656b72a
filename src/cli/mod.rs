//! CLI module for Lumen
//!
//! Provides command-line interface parsing for the lumen-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use crate::types::EffortLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lumen - multi-agent deep research server
///
/// Runs iterative web research with a researcher, an analyst and a writer
/// agent, and streams a cited report.
#[derive(Parser, Debug)]
#[command(
    name = "lumen-server",
    version,
    about = "Lumen - multi-agent deep research server",
    long_about = "Runs iterative web research with researcher, analyst and writer agents,\n\
                  looping while knowledge gaps remain, and streams a cited report.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a config.",
    after_help = "EXAMPLES:\n    \
                  lumen-server init                          # Scaffold lumen.toml\n    \
                  lumen-server                               # Start the server (requires lumen.toml)\n    \
                  lumen-server research \"fusion power\"       # Run one research session in the terminal\n    \
                  lumen-server config --validate             # Check the configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "lumen.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (the default when no subcommand is given)
    Serve,

    /// Run a single research session and print progress and the report
    Research {
        /// The research question
        query: String,

        /// Effort preset: low, medium or high
        #[arg(short, long)]
        effort: Option<EffortLevel>,

        /// Number of search queries in the first research pass
        #[arg(short = 'q', long)]
        queries: Option<i64>,

        /// Maximum number of follow-up research loops
        #[arg(short = 'l', long)]
        loops: Option<i64>,

        /// Print every event as a JSON line instead of rendered output
        #[arg(long)]
        json: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Initialize a new Lumen configuration
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama or openai)
        #[arg(long, default_value = "ollama", value_parser = ["ollama", "openai"])]
        provider: String,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
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
    fn test_no_subcommand_defaults() {
        let cli = Cli::try_parse_from(["lumen-server"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("lumen.toml"));
    }

    #[test]
    fn test_research_arguments() {
        let cli = Cli::try_parse_from([
            "lumen-server",
            "--config",
            "custom.toml",
            "research",
            "quantum computing",
            "--effort",
            "high",
            "-l",
            "0",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Some(Commands::Research {
                query,
                effort,
                queries,
                loops,
                json,
            }) => {
                assert_eq!(query, "quantum computing");
                assert_eq!(effort, Some(EffortLevel::High));
                assert_eq!(queries, None);
                assert_eq!(loops, Some(0));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["lumen-server", "init", "--provider", "bedrock"]).is_err());
    }
}
