//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EventAssist - natural-language event management
#[derive(Parser)]
#[command(
    name = "ea",
    about = "Manage events and venues by describing what you want",
    version,
    after_help = "Logs are written to: ~/.local/share/eventassist/logs/eventassist.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Send one request, e.g. "create a monthly book club on the 3rd Tuesday at 7pm"
    Ask {
        /// The request, in plain language
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Start an interactive session that remembers earlier requests
    Chat,

    /// List stored events
    Events {
        /// Only events whose title contains this text
        #[arg(short, long)]
        title: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored venues
    Venues {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with the API key masked
    Show,

    /// Check that an API key is available and the limits are valid
    Check,
}

/// Output format for command results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Location of the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventassist")
        .join("logs")
        .join("eventassist.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["ea"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_ask_joins_words() {
        let cli = Cli::parse_from(["ea", "ask", "list", "my", "venues"]);
        if let Some(Command::Ask { prompt, format }) = cli.command {
            assert_eq!(prompt.join(" "), "list my venues");
            assert_eq!(format, OutputFormat::Text);
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_cli_parse_ask_json() {
        let cli = Cli::parse_from(["ea", "ask", "--format", "json", "list venues"]);
        assert!(matches!(cli.command, Some(Command::Ask { format: OutputFormat::Json, .. })));
    }

    #[test]
    fn test_cli_ask_requires_prompt() {
        assert!(Cli::try_parse_from(["ea", "ask"]).is_err());
    }

    #[test]
    fn test_cli_parse_chat() {
        let cli = Cli::parse_from(["ea", "chat"]);
        assert!(matches!(cli.command, Some(Command::Chat)));
    }

    #[test]
    fn test_cli_parse_events_with_title() {
        let cli = Cli::parse_from(["ea", "events", "-t", "Book Club"]);
        if let Some(Command::Events { title, .. }) = cli.command {
            assert_eq!(title.as_deref(), Some("Book Club"));
        } else {
            panic!("Expected Events command");
        }
    }

    #[test]
    fn test_cli_parse_config_subcommands() {
        let cli = Cli::parse_from(["ea", "config", "show"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                command: ConfigCommand::Show
            })
        ));
        let cli = Cli::parse_from(["ea", "config", "check"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                command: ConfigCommand::Check
            })
        ));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config_and_verbose() {
        let cli = Cli::parse_from(["ea", "-c", "/path/to/config.yml", "-v", "venues"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("eventassist/logs/eventassist.log"));
    }
}
