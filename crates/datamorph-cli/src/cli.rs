//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API,
//! providing a type-safe and well-documented command interface.

use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;

/// Datamorph CLI - Map heterogeneous JSON sources into one target document
///
/// Fetches the sources named by a mapping configuration, runs field
/// mappings, merging, transformation pipelines and output wrapping, and
/// prints the resulting document.
#[derive(Parser, Debug)]
#[command(
    name = "datamorph",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the CLI settings file
    #[arg(short, long, global = true, env = "DATAMORPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch sources and run a mapping configuration
    Run(RunArgs),

    /// Statically validate a mapping configuration
    Validate(ValidateArgs),

    /// Manage the CLI settings file
    Config(ConfigArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the mapping configuration (JSON or YAML)
    #[arg(value_name = "CONFIG")]
    pub mapping: PathBuf,

    /// Location of a source, overriding settings and descriptor metadata
    #[arg(long = "source", value_name = "ID=PATH_OR_URL", value_parser = parse_source_override)]
    pub sources: Vec<(String, String)>,

    /// Save the mapped document to a file
    #[arg(long = "save-to", value_name = "OUTPUT_FILE")]
    pub save_to: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Per-source fetch budget in milliseconds
    #[arg(long, value_name = "MILLIS")]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the mapping configuration (JSON or YAML)
    #[arg(value_name = "CONFIG")]
    pub mapping: PathBuf,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Settings management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default settings file
    Init(ConfigInitArgs),

    /// Show the effective settings
    Show(ConfigShowArgs),
}

/// Arguments for config init
#[derive(Parser, Debug)]
pub struct ConfigInitArgs {
    /// Where to write the settings file
    #[arg(long, value_name = "PATH", default_value = ".datamorph.yaml")]
    pub path: PathBuf,

    /// Force overwrite an existing settings file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for config show
#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    /// Show settings in specified format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Settings file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}

/// Parse `ID=LOCATION` pairs for `--source`
fn parse_source_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((id, location)) if !id.trim().is_empty() && !location.trim().is_empty() => {
            Ok((id.trim().to_string(), location.trim().to_string()))
        }
        _ => Err(format!("expected ID=PATH_OR_URL, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "datamorph",
            "-v",
            "run",
            "mapping.yaml",
            "--source",
            "news=https://example.com/feed.json",
            "--source",
            "blog=./blog.json",
            "--pretty",
            "--timeout-ms",
            "500",
        ]);

        assert_eq!(cli.verbosity_level(), 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.mapping, PathBuf::from("mapping.yaml"));
                assert_eq!(
                    args.sources,
                    vec![
                        ("news".to_string(), "https://example.com/feed.json".to_string()),
                        ("blog".to_string(), "./blog.json".to_string()),
                    ]
                );
                assert!(args.pretty);
                assert_eq!(args.timeout_ms, Some(500));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_source_override_parsing() {
        assert_eq!(
            parse_source_override("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_source_override("missing").is_err());
        assert!(parse_source_override("=path").is_err());
        assert!(parse_source_override("id=").is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["datamorph", "-q", "-v", "validate", "m.json"]).is_err());
    }
}
