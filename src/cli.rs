//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::api::{ChatMessage, ExpiryStrategy, SimilarityMode};

/// Administrative console for the conversational-memory backend
#[derive(Parser, Debug)]
#[command(name = "memory-console")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "MEMORY_CONSOLE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the configuration file)
    #[arg(long, env = "MEMORY_CONSOLE_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "MEMORY_CONSOLE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "MEMORY_CONSOLE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// How successful payloads are printed
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Disable colored notifications
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Output format for successful payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Raw payload as pretty JSON
    Json,
    /// Raw payload as YAML
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a chat transcript
    Submit {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Application name
        #[arg(short, long)]
        app: String,

        /// Message as ROLE:CONTENT (repeatable, in order)
        #[arg(short, long = "message", required = true)]
        messages: Vec<ChatMessage>,
    },

    /// Similarity search over stored memories
    Query {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Application name
        #[arg(short, long)]
        app: String,

        /// Query text
        #[arg(required = true)]
        text: String,

        /// Number of results (1-20)
        #[arg(short = 'k', long)]
        top_k: Option<u32>,

        /// How to interpret the backend's similarity field
        #[arg(long, value_enum)]
        similarity_mode: Option<SimilarityMode>,
    },

    /// List memories of a user/app pair
    List {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Application name
        #[arg(short, long)]
        app: String,
    },

    /// Delete one memory
    Delete {
        /// Memory id
        #[arg(required = true)]
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show chat history grouped by session
    History {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Application name
        #[arg(short, long)]
        app: String,

        /// Restrict to one session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Per-user memory configuration
    #[command(subcommand)]
    Config(UserConfigCommand),

    /// Per-application configuration
    #[command(subcommand)]
    AppConfig(AppConfigCommand),
}

/// Per-user configuration subcommands
#[derive(Subcommand, Debug)]
pub enum UserConfigCommand {
    /// Show the configuration
    Get {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Application name
        #[arg(short, long)]
        app: String,
    },

    /// Update selected fields
    Set {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Application name
        #[arg(short, long)]
        app: String,

        /// Extraction prompt
        #[arg(long)]
        extraction_prompt: Option<String>,

        /// Merge threshold (0-1)
        #[arg(long)]
        merge_threshold: Option<f64>,

        /// Expiry strategy
        #[arg(long, value_enum)]
        expiry_strategy: Option<ExpiryStrategy>,

        /// Days until expiry
        #[arg(long)]
        expiry_days: Option<u32>,
    },
}

/// Per-application configuration subcommands
#[derive(Subcommand, Debug)]
pub enum AppConfigCommand {
    /// Show one application's configuration, or all of them
    Get {
        /// Application name (omit to list all)
        #[arg(short, long)]
        app: Option<String>,
    },

    /// Apply an update read from a YAML or JSON file
    Set {
        /// Application name
        #[arg(short, long)]
        app: String,

        /// File holding the fields to update
        #[arg(short, long, required = true)]
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_submit_messages() {
        let cli = Cli::try_parse_from([
            "memory-console",
            "submit",
            "-u",
            "u1",
            "-a",
            "a1",
            "-m",
            "user:hi",
            "-m",
            "assistant:hello",
        ])
        .unwrap();

        match cli.command {
            Command::Submit { messages, .. } => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[1].role, Role::Assistant);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_roles() {
        let result = Cli::try_parse_from([
            "memory-console", "submit", "-u", "u1", "-a", "a1", "-m", "system:hi",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_nested_config_commands() {
        let cli = Cli::try_parse_from([
            "memory-console",
            "--output",
            "json",
            "config",
            "set",
            "-u",
            "u1",
            "-a",
            "a1",
            "--expiry-strategy",
            "last-access",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Command::Config(UserConfigCommand::Set {
                expiry_strategy: Some(ExpiryStrategy::LastAccess),
                ..
            })
        ));
    }
}
