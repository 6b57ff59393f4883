use async_trait::async_trait;
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use termrelay_monitor::{ChatTransport, TransportError};
use termrelay_types::{Destination, MessageId};

pub const DEFAULT_POST_LIMIT: usize = 4000;
pub const DEFAULT_UPDATE_LIMIT: usize = 3000;

/// Chat transport that prints to the terminal. Posts get a fresh id;
/// updates are printed as a replacement line for the message they edit.
pub struct ConsoleTransport {
    post_limit: usize,
    update_limit: usize,
    closed: AtomicBool,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_POST_LIMIT, DEFAULT_UPDATE_LIMIT)
    }

    pub fn with_limits(post_limit: usize, update_limit: usize) -> Self {
        Self {
            post_limit,
            update_limit,
            closed: AtomicBool::new(false),
        }
    }

    /// Reject everything from now on, e.g. once stdout has gone away
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check(&self, text: &str, max: usize) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let len = text.chars().count();
        if len > max {
            return Err(TransportError::TooLong { len, max });
        }
        Ok(())
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    fn max_post_len(&self) -> usize {
        self.post_limit
    }

    fn max_update_len(&self) -> usize {
        self.update_limit
    }

    async fn post_message(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<MessageId, TransportError> {
        self.check(text, self.post_limit)?;

        let id = MessageId::new(uuid::Uuid::new_v4().simple().to_string());
        println!("{} {}", format!("[{}]", destination).bright_black(), text);
        Ok(id)
    }

    async fn update_message(
        &self,
        destination: &Destination,
        _message: &MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        self.check(text, self.update_limit)?;

        println!(
            "{} {}",
            format!("[{} status]", destination).bright_black(),
            text.bright_cyan()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_post_returns_distinct_ids() {
        let transport = ConsoleTransport::new();
        let dest = Destination::channel("console");

        let first = tokio_test::block_on(transport.post_message(&dest, "hello")).unwrap();
        let second = tokio_test::block_on(transport.post_message(&dest, "hello")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_limits_are_enforced() {
        let transport = ConsoleTransport::with_limits(10, 5);
        let dest = Destination::channel("console");
        let id = MessageId::new("m1");

        match tokio_test::block_on(transport.post_message(&dest, "01234567890")) {
            Err(TransportError::TooLong { len, max }) => assert_eq!((len, max), (11, 10)),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(tokio_test::block_on(transport.update_message(&dest, &id, "012345")).is_err());
        assert!(tokio_test::block_on(transport.update_message(&dest, &id, "01234")).is_ok());
        assert_eq!(transport.max_post_len(), 10);
        assert_eq!(transport.max_update_len(), 5);
    }

    #[test]
    fn test_closed_transport_rejects() {
        let transport = ConsoleTransport::new();
        transport.close();
        let result = tokio_test::block_on(transport.post_message(&Destination::channel("c"), "x"));
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
