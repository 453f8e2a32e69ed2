//! Broker consumer adapter. One long-lived subscriber per input topic,
//! surfacing decoded raw records on a channel and committing offsets only
//! after the downstream transformer has accepted the message.

mod consumer;

pub use consumer::{spawn_consumer, ConsumerHandle};

/// Strips the 6-byte framing/schema prefix every broker message value
/// carries before the remaining bytes are JSON-decoded. Decoding failures
/// (including an undersized message) are fatal: they indicate schema drift,
/// not a transient condition.
pub fn strip_frame(value: &[u8]) -> anyhow::Result<&[u8]> {
    value
        .get(6..)
        .ok_or_else(|| anyhow::anyhow!("message shorter than the 6-byte framing prefix"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exactly_six_bytes() {
        let value = b"PREFIXhello";
        assert_eq!(strip_frame(value).unwrap(), b"hello");
    }

    #[test]
    fn undersized_message_is_an_error() {
        assert!(strip_frame(b"abc").is_err());
    }
}
