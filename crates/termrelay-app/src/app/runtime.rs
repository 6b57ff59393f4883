use anyhow::{Context, Result};
use std::future::Future;
use tokio::runtime::Builder;

/// Run `task` on a fresh multi-threaded runtime and return its result without
/// waiting for blocking work it leaves behind.
///
/// Tokio reads stdin on a blocking thread that cannot be interrupted, so after
/// chat mode exits a read stays parked until the next line arrives. Dropping
/// the runtime would wait for it; it is shut down in the background instead.
pub fn run_to_completion<F>(task: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(task);
    runtime.shutdown_background();
    result
}
