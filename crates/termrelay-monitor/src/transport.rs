/// Chat transport abstraction
use async_trait::async_trait;
use termrelay_types::{Destination, MessageId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("message rejected: {0}")]
    Rejected(String),
    #[error("message too long ({len} > {max} characters)")]
    TooLong { len: usize, max: usize },
    #[error("transport closed")]
    Closed,
}

/// Where status and content messages are delivered.
///
/// New messages and in-place updates have separate length limits; the update
/// limit is the stricter one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Longest text accepted by [`ChatTransport::post_message`], in characters
    fn max_post_len(&self) -> usize;

    /// Longest text accepted by [`ChatTransport::update_message`], in characters
    fn max_update_len(&self) -> usize;

    async fn post_message(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<MessageId, TransportError>;

    async fn update_message(
        &self,
        destination: &Destination,
        message: &MessageId,
        text: &str,
    ) -> Result<(), TransportError>;
}
