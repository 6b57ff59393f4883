use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use termrelay_config::MappingConfig;
use termrelay_logging::RelayLogger;
use termrelay_types::{ExecutionKey, SessionMapping};

use crate::app::commands::{connect, print_outcome, send_to_thread};
use crate::app::setup::AppContext;
use crate::mapping::FileMappingStore;

/// Periodically drop mappings that have been idle too long
pub fn spawn_cleanup_task(
    mappings: Arc<FileMappingStore>,
    config: MappingConfig,
    logger: Arc<RelayLogger>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(config.cleanup_interval_minutes.max(1) * 60);
        let max_inactive = chrono::Duration::minutes(config.max_inactive_minutes as i64);
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match mappings.cleanup_inactive(max_inactive) {
                    Ok(0) => {}
                    Ok(removed) => logger.info(
                        "mappings",
                        &format!("removed {} inactive mapping(s)", removed),
                    ),
                    Err(e) => logger.warn("mappings", &format!("cleanup failed: {}", e)),
                },
            }
        }
    })
}

/// Run the interactive relay against `target`
pub async fn run_chat_mode(ctx: &AppContext, target: &str, channel: &str) -> Result<()> {
    let mapping = connect(ctx, target, channel).await?;
    let key = ExecutionKey::new(&mapping.destination(), &mapping.session);

    println!(
        "{} {} {}",
        "Relaying to".bright_cyan(),
        mapping.session.to_string().bright_cyan().bold(),
        "(Ctrl-C stops the running relay, Ctrl-C at the prompt or 'exit' quits)".bright_black()
    );

    let shutdown = CancellationToken::new();
    let cleanup = spawn_cleanup_task(
        ctx.mappings.clone(),
        ctx.config.mapping.clone(),
        ctx.logger.clone(),
        shutdown.clone(),
    );

    // Key of the execution that Ctrl-C should stop, if one is running
    let active: Arc<Mutex<Option<ExecutionKey>>> = Arc::new(Mutex::new(None));

    let active_clone = active.clone();
    let monitor = ctx.monitor.clone();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            let running = active_clone.lock().ok().and_then(|guard| guard.clone());
            match running {
                Some(key) => {
                    println!("\n{}", "^C - Stopping the relay...".bright_yellow());
                    monitor.cancel(&key);
                }
                None => {
                    shutdown_clone.cancel();
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "You:".bright_green().bold());
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        // Idle cleanup may have dropped the mapping while waiting at the prompt
        ensure_mapping(ctx, &mapping)?;

        set_active(&active, Some(key.clone()));
        let result = send_to_thread(ctx, &mapping.thread_key, input).await;
        set_active(&active, None);

        match result {
            Ok(Some(outcome)) => print_outcome(&outcome),
            Ok(None) => {
                println!("{}", "Session has ended.".bright_red());
                break;
            }
            Err(e) => eprintln!("{} {:#}", "Error:".bright_red(), e),
        }
    }

    shutdown.cancel();
    cleanup.await.ok();
    ctx.mappings.save()?;
    println!("{}", "Goodbye!".bright_cyan());
    Ok(())
}

fn ensure_mapping(ctx: &AppContext, mapping: &SessionMapping) -> Result<()> {
    if !ctx.mappings.has(&mapping.thread_key) {
        ctx.mappings
            .create(mapping.thread_key.clone(), mapping.session.clone(), mapping.channel.clone())?;
    }
    Ok(())
}

fn set_active(active: &Mutex<Option<ExecutionKey>>, key: Option<ExecutionKey>) {
    if let Ok(mut guard) = active.lock() {
        *guard = key;
    }
}
