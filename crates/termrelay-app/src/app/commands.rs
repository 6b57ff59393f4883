use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use colored::Colorize;

use termrelay_monitor::ChatTransport;
use termrelay_terminal::SessionBackend;
use termrelay_types::{format_duration, Destination, MonitorEnd, MonitorOutcome, SessionInfo, SessionMapping};

use crate::app::setup::AppContext;
use crate::cli::MappingCommands;
use crate::mapping::MappingStore;
use crate::sessions::{format_mapping_list, format_session_list, resolve_session};

/// List tmux sessions
pub async fn run_list(ctx: &AppContext) -> Result<()> {
    let version = ctx.backend.verify().await.context("Failed to run tmux")?;
    ctx.logger.debug("list", &version);

    let sessions = ctx
        .backend
        .list_sessions()
        .await
        .context("Failed to list tmux sessions")?;
    println!("{}", format_session_list(&sessions));
    Ok(())
}

async fn find_session(ctx: &AppContext, target: &str) -> Result<SessionInfo> {
    let sessions = ctx
        .backend
        .list_sessions()
        .await
        .context("Failed to list tmux sessions")?;
    if sessions.is_empty() {
        bail!("{}", format_session_list(&sessions));
    }

    resolve_session(target, &sessions)
        .cloned()
        .ok_or_else(|| anyhow!("Session \"{}\" not found\n\n{}", target, format_session_list(&sessions)))
}

/// Connect a new conversation to a session. The "connected" message starts
/// the conversation, so its id becomes the thread key.
pub async fn connect(ctx: &AppContext, target: &str, channel: &str) -> Result<SessionMapping> {
    let info = find_session(ctx, target).await?;
    let session = info.handle();

    if !ctx.backend.session_exists(&session).await? {
        bail!("tmux session {} does not exist", session);
    }
    let directory = ctx
        .backend
        .working_directory(&session)
        .await
        .with_context(|| format!("Failed to read the working directory of {}", session))?;

    let message = ctx
        .transport
        .post_message(
            &Destination::channel(channel),
            &format!(
                "✅ Connected to `{}`\n📁 `{}`\n\nReplies in this thread are typed into the session.",
                session, directory
            ),
        )
        .await
        .context("Failed to post the connection message")?;

    let mapping = ctx.mappings.create(message.as_str(), session, channel)?;
    ctx.logger.info(
        "connect",
        &format!("thread {} → session {}", mapping.thread_key, mapping.session),
    );
    Ok(mapping)
}

pub async fn run_connect(ctx: &AppContext, target: &str, channel: &str) -> Result<()> {
    let mapping = connect(ctx, target, channel).await?;
    println!("{} {}", "Thread key:".bright_cyan().bold(), mapping.thread_key);
    Ok(())
}

/// Relay `text` through the mapping for `thread_key`. Returns `None` when the
/// mapped session has gone away, in which case the mapping is dropped.
pub async fn send_to_thread(
    ctx: &AppContext,
    thread_key: &str,
    text: &str,
) -> Result<Option<MonitorOutcome>> {
    let mapping = ctx
        .mappings
        .lookup(thread_key)
        .ok_or_else(|| anyhow!("No session is connected to thread {}", thread_key))?;
    let destination = mapping.destination();

    if !ctx.backend.session_exists(&mapping.session).await? {
        let notice = format!("❌ tmux session {} not found. It may have ended.", mapping.session);
        if let Err(e) = ctx.transport.post_message(&destination, &notice).await {
            ctx.logger.warn("send", &format!("failed to post notice: {}", e));
        }
        ctx.mappings.remove(thread_key)?;
        ctx.logger.info(
            "send",
            &format!("removed mapping {} for ended session {}", thread_key, mapping.session),
        );
        return Ok(None);
    }

    ctx.mappings.record_activity(thread_key)?;
    let outcome = ctx
        .monitor
        .monitor(mapping.session.clone(), text, destination)
        .await?;
    Ok(Some(outcome))
}

pub fn print_outcome(outcome: &MonitorOutcome) {
    let elapsed = format_duration(outcome.duration_secs);
    let summary = format!(
        "{} after {}, {} message(s) sent",
        outcome.end, elapsed, outcome.sent_messages
    );
    match outcome.end {
        MonitorEnd::Completed => println!("{}", summary.bright_green()),
        MonitorEnd::Cancelled => println!("{}", summary.bright_yellow()),
        MonitorEnd::SessionLost => println!("{}", summary.bright_red()),
    }
}

pub async fn run_send(ctx: &AppContext, thread_key: &str, text: &str) -> Result<()> {
    match send_to_thread(ctx, thread_key, text).await? {
        Some(outcome) => print_outcome(&outcome),
        None => println!("{}", "Session has ended; mapping removed.".bright_yellow()),
    }
    Ok(())
}

/// One-off relay without a mapping
pub async fn run_once(ctx: &AppContext, target: &str, text: &str, channel: &str) -> Result<()> {
    let info = find_session(ctx, target).await?;
    let outcome = ctx
        .monitor
        .monitor(info.handle(), text, Destination::channel(channel))
        .await?;
    print_outcome(&outcome);
    Ok(())
}

pub fn run_mappings(ctx: &AppContext, command: &MappingCommands) -> Result<()> {
    match command {
        MappingCommands::List => {
            println!("{}", format_mapping_list(&ctx.mappings.all(), Utc::now()));
        }
        MappingCommands::Remove { thread_key } => {
            if ctx.mappings.remove(thread_key)? {
                println!("Removed mapping for thread {}", thread_key);
            } else {
                println!("No mapping for thread {}", thread_key);
            }
        }
        MappingCommands::Cleanup { max_inactive_minutes } => {
            let minutes = max_inactive_minutes.unwrap_or(ctx.config.mapping.max_inactive_minutes);
            let removed = ctx
                .mappings
                .cleanup_inactive(Duration::minutes(minutes as i64))?;
            println!(
                "Removed {} mapping(s) inactive for more than {} minute(s)",
                removed, minutes
            );
        }
    }
    Ok(())
}
