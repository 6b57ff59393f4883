//! termrelay application library
//!
//! CLI, session-to-conversation mappings, console transport and the run modes
//! built on the terminal session monitor.

pub mod app;
pub mod cli;
pub mod console_transport;
pub mod mapping;
pub mod sessions;

pub use app::{setup_from_cli, AppContext};
pub use cli::{Cli, Commands, MappingCommands};
pub use console_transport::ConsoleTransport;
pub use mapping::{FileMappingStore, MappingStore};
pub use sessions::{format_mapping_list, format_session_list, resolve_session};
