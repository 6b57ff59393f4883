use clap::{Parser, Subcommand};
use std::path::PathBuf;
use termrelay_config::DEFAULT_CONFIG_FILE;

/// CLI arguments for termrelay
#[derive(Parser, Debug)]
#[command(name = "termrelay")]
#[command(about = "Drive an interactive program in a tmux session and relay its output to a chat")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (created with defaults if missing)
    #[arg(long, value_name = "PATH", env = "TERMRELAY_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    /// Print debug diagnostics (also enabled by TERMRELAY_DEBUG=true)
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub verbose: bool,

    /// Append monitor events to ~/.termrelay/logs as JSON lines
    #[arg(long, action = clap::ArgAction::SetTrue, global = true)]
    pub event_log: bool,

    /// Session mapping file, overriding mapping.file from the configuration
    #[arg(long, value_name = "PATH", env = "TERMRELAY_MAPPING_FILE", global = true)]
    pub mapping_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tmux sessions
    List,

    /// Connect a conversation to a tmux session and print its thread key
    Connect {
        /// Session number from `list`, or its exact name
        target: String,

        /// Channel the conversation lives in
        #[arg(long, default_value = "console")]
        channel: String,
    },

    /// Send input through an existing mapping and relay the output
    Send {
        /// Thread key printed by `connect`
        thread_key: String,

        /// Text to type into the session
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Send input to a session without creating a mapping
    Run {
        /// Session number from `list`, or its exact name
        session: String,

        /// Text to type into the session
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,

        /// Channel to relay into
        #[arg(long, default_value = "console")]
        channel: String,
    },

    /// Interactive relay: every line typed becomes input for the session
    Chat {
        /// Session number from `list`, or its exact name
        target: String,

        /// Channel the conversation lives in
        #[arg(long, default_value = "console")]
        channel: String,
    },

    /// Manage conversation-to-session mappings
    Mappings {
        #[command(subcommand)]
        command: MappingCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum MappingCommands {
    /// List all mappings
    List,

    /// Remove the mapping for a thread
    Remove {
        thread_key: String,
    },

    /// Remove mappings without recent activity
    Cleanup {
        /// Idle threshold, defaults to mapping.max_inactive_minutes
        #[arg(long)]
        max_inactive_minutes: Option<u64>,
    },
}

/// Join trailing words back into the text typed into the session
pub fn join_text(words: &[String]) -> String {
    words.join(" ")
}
