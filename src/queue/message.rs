use std::time::Duration;

use async_nats::jetstream::AckKind;
use bytes::Bytes;

/// A delivered JetStream message, narrowed to the primitives the write
/// protocol and CDC consumer actually need: payload, subject, redelivery
/// count, and the three terminal actions (ack, nak-with-delay, term).
pub struct DeliveredMessage {
    inner: async_nats::jetstream::Message,
}

impl DeliveredMessage {
    #[must_use]
    pub const fn new(inner: async_nats::jetstream::Message) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.inner.payload
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.inner.subject.as_str()
    }

    /// 1-indexed count of delivery attempts for this message, per the
    /// consumer's redelivery tracking. The first delivery reports `1`.
    pub fn delivery_count(&self) -> u64 {
        self.inner
            .info()
            .map(|info| info.delivered)
            .unwrap_or(1)
    }

    pub async fn ack(&self) -> Result<(), async_nats::Error> {
        self.inner.ack().await
    }

    pub async fn nak_with_delay(&self, delay: Duration) -> Result<(), async_nats::Error> {
        self.inner.ack_with(AckKind::Nak(Some(delay))).await
    }
}
