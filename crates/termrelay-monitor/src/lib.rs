//! Terminal session monitor
//!
//! Relays the output of an interactive program running in a terminal session
//! to a chat transport: anchor-based diffing of successive captures, debounced
//! completion detection, an adaptive poll schedule, and deduplicated, size
//! bounded delivery.

pub mod completion;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod transport;

pub use completion::{
    idle_policy_from_config, BannerIdlePolicy, CompletionDetector, CompletionState, IdlePolicy,
    PromptIdlePolicy,
};
pub use diff::{compute_delta, Delta};
pub use dispatcher::{split_output, OutputDispatcher};
pub use error::MonitorError;
pub use monitor::Monitor;
pub use scheduler::PollScheduler;
pub use status::StatusLine;
pub use store::{ExecutionStore, ExecutionTicket};
pub use transport::{ChatTransport, TransportError};
