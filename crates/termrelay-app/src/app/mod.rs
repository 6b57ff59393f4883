pub mod chat;
pub mod commands;
pub mod runtime;
pub mod setup;

pub use chat::run_chat_mode;
pub use commands::{run_connect, run_list, run_mappings, run_once, run_send};
pub use runtime::run_to_completion;
pub use setup::{setup_from_cli, AppContext};
