//! Output dispatch
//!
//! Content goes out as a sequence of new messages, split to the transport's
//! size limit and deduplicated against the last chunk sent for the execution.
//! The status message is a single message updated in place and never carries
//! content.

use std::sync::Arc;
use termrelay_config::DispatchConfig;
use termrelay_logging::{safe_truncate, RelayLogger};
use termrelay_types::{Destination, MessageId};

use crate::status::StatusLine;
use crate::store::ExecutionTicket;
use crate::transport::ChatTransport;

const FENCE_OPEN: &str = "```\n";
const FENCE_CLOSE: &str = "\n```";

/// Split `text` into chunks of at most `max_len` characters, breaking after the
/// last newline inside the limit and hard-splitting lines longer than the
/// limit. Each newline stays at the end of the chunk it terminates, so the
/// chunks concatenate back to `text`.
pub fn split_output(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let limit = match rest.char_indices().nth(max_len) {
            Some((index, _)) => index,
            None => {
                chunks.push(rest.to_string());
                break;
            }
        };

        let split = match rest[..limit].rfind('\n') {
            Some(newline) => newline + 1,
            None => limit,
        };
        chunks.push(rest[..split].to_string());
        rest = &rest[split..];
    }

    chunks
}

/// Sends content and status messages for monitoring loops
#[derive(Clone)]
pub struct OutputDispatcher {
    transport: Arc<dyn ChatTransport>,
    config: DispatchConfig,
    logger: Arc<RelayLogger>,
}

impl OutputDispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        config: DispatchConfig,
        logger: Arc<RelayLogger>,
    ) -> Self {
        Self {
            transport,
            config,
            logger,
        }
    }

    /// Largest chunk that still fits a new message once fenced
    pub fn chunk_limit(&self) -> usize {
        let post_limit = self.transport.max_post_len();
        let available = if self.config.code_fence {
            post_limit.saturating_sub(FENCE_OPEN.len() + FENCE_CLOSE.len())
        } else {
            post_limit
        };
        self.config.max_chunk_len.min(available).max(1)
    }

    fn format_chunk(&self, chunk: &str) -> String {
        if self.config.code_fence {
            format!("{}{}{}", FENCE_OPEN, chunk.trim_end_matches('\n'), FENCE_CLOSE)
        } else {
            chunk.to_string()
        }
    }

    /// Deliver `text` as content messages. Returns how many were actually
    /// posted. Chunks equal to the last one sent for this execution are
    /// skipped; a failed post is logged and dropped.
    pub async fn dispatch(
        &self,
        ticket: &ExecutionTicket,
        destination: &Destination,
        text: &str,
    ) -> usize {
        let scope = ticket.key().as_str();
        let mut sent = 0;

        for chunk in split_output(text, self.chunk_limit()) {
            if ticket.is_cancelled() {
                self.logger.debug(scope, "execution cancelled, dropping remaining chunks");
                break;
            }
            if chunk.trim().is_empty() {
                continue;
            }
            if ticket.last_sent().as_deref() == Some(chunk.as_str()) {
                self.logger.debug(
                    scope,
                    &format!("skipping duplicate chunk ({} chars)", chunk.chars().count()),
                );
                continue;
            }

            match self
                .transport
                .post_message(destination, &self.format_chunk(&chunk))
                .await
            {
                Ok(_) => {
                    ticket.record_sent(&chunk);
                    sent += 1;
                }
                Err(e) => self.logger.warn(scope, &format!("failed to post content: {}", e)),
            }
        }

        sent
    }

    /// Post a one-off notice (session ended, errors)
    pub async fn post_notice(&self, destination: &Destination, text: &str) -> Option<MessageId> {
        let text = safe_truncate(text, self.transport.max_post_len());
        match self.transport.post_message(destination, &text).await {
            Ok(id) => Some(id),
            Err(e) => {
                self.logger
                    .warn(&destination.to_string(), &format!("failed to post notice: {}", e));
                None
            }
        }
    }

    /// Create the status message. Its text is kept within the update limit so
    /// that later updates replace it like for like.
    pub async fn post_status(
        &self,
        destination: &Destination,
        status: &StatusLine,
    ) -> Option<MessageId> {
        let limit = self.transport.max_update_len().min(self.transport.max_post_len());
        let text = safe_truncate(&status.to_string(), limit);
        match self.transport.post_message(destination, &text).await {
            Ok(id) => Some(id),
            Err(e) => {
                self.logger
                    .warn(&destination.to_string(), &format!("failed to post status: {}", e));
                None
            }
        }
    }

    /// Update the status message in place. Without a status message (its
    /// creation failed) this is a no-op.
    pub async fn update_status(
        &self,
        destination: &Destination,
        message: Option<&MessageId>,
        status: &StatusLine,
    ) -> bool {
        let message = match message {
            Some(message) => message,
            None => return false,
        };

        let text = safe_truncate(&status.to_string(), self.transport.max_update_len());
        match self.transport.update_message(destination, message, &text).await {
            Ok(()) => true,
            Err(e) => {
                self.logger
                    .warn(&destination.to_string(), &format!("failed to update status: {}", e));
                false
            }
        }
    }
}
