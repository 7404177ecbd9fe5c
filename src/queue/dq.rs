use std::time::Duration;

use async_nats::HeaderMap;
use async_nats::jetstream::{self, consumer::pull, stream};
use bytes::Bytes;
use secrecy::ExposeSecret;

use crate::configuration::QueueSettings;
use crate::domain::EntityTable;

use super::DeliveredMessage;

/// Owns the JetStream context and the stream/consumer naming convention.
/// Every stream/consumer creation call is idempotent (`get_or_create_*`) so
/// every process that starts up can call `ensure_streams` without
/// coordinating who goes first.
#[derive(Clone)]
pub struct DurableQueue {
    context: jetstream::Context,
    settings: QueueSettings,
}

impl DurableQueue {
    pub async fn connect(settings: QueueSettings) -> Result<Self, async_nats::Error> {
        let client = async_nats::connect(settings.nats_url.expose_secret()).await?;
        let context = jetstream::new(client);
        Ok(Self { context, settings })
    }

    /// Creates `WRITES`, `WRITES_DLQ`, and `DB_CDC` if they don't already
    /// exist. `DB_CDC` is externally maintained by the replication bridge in
    /// production; creating it here only matters for local/test setups that
    /// don't run that bridge.
    pub async fn ensure_streams(&self) -> Result<(), async_nats::Error> {
        self.context
            .get_or_create_stream(stream::Config {
                name: self.settings.writes_stream.clone(),
                subjects: vec![format!("{}.*", self.settings.writes_stream.to_lowercase())],
                ..Default::default()
            })
            .await?;
        self.context
            .get_or_create_stream(stream::Config {
                name: self.settings.dlq_stream.clone(),
                subjects: vec![format!("{}.*", self.settings.dlq_stream.to_lowercase())],
                ..Default::default()
            })
            .await?;
        self.context
            .get_or_create_stream(stream::Config {
                name: self.settings.cdc_stream.clone(),
                subjects: vec![format!("{}.*", self.settings.cdc_stream.to_lowercase())],
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    fn writes_subject(&self, table: EntityTable) -> String {
        format!("{}.{}", self.settings.writes_stream.to_lowercase(), table.as_str())
    }

    fn dlq_subject(&self, table: EntityTable) -> String {
        format!("{}.{}", self.settings.dlq_stream.to_lowercase(), table.as_str())
    }

    fn cdc_subject(&self, table: EntityTable) -> String {
        format!("{}.{}", self.settings.cdc_stream.to_lowercase(), table.as_str())
    }

    /// Publishes one message per logical operation, deduplicated by
    /// `operation_id` via the `Nats-Msg-Id` header within JetStream's dedup
    /// window. Retrying the same `operation_id` is therefore a no-op at the
    /// queue layer; the ledger's unique constraint covers redeliveries
    /// beyond that window.
    pub async fn publish_write(
        &self,
        table: EntityTable,
        operation_id: uuid::Uuid,
        payload: Bytes,
    ) -> Result<(), async_nats::Error> {
        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", operation_id.to_string().as_str());
        let ack = self
            .context
            .publish_with_headers(self.writes_subject(table), headers, payload)
            .await?;
        ack.await?;
        Ok(())
    }

    /// Publishes a poison message to the DLQ and waits for JetStream's own
    /// terminal acknowledgement before the caller acks the original
    /// delivery — losing the original ack without the DLQ write actually
    /// landing would silently drop the operation.
    pub async fn publish_dlq(
        &self,
        table: EntityTable,
        original_payload: Bytes,
        error: &str,
        redelivery_count: u64,
    ) -> Result<(), async_nats::Error> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Original-Subject", self.writes_subject(table).as_str());
        headers.insert("X-Error", error);
        headers.insert("X-Redelivery-Count", redelivery_count.to_string().as_str());
        let ack = self
            .context
            .publish_with_headers(self.dlq_subject(table), headers, original_payload)
            .await?;
        ack.await?;
        Ok(())
    }

    /// One durable pull consumer per table, filtered to that table's
    /// subject. `max_deliver` and `ack_wait` come straight from config;
    /// competing consumers on the same durable name scale horizontally
    /// without any coordination beyond what JetStream already provides.
    pub async fn writes_consumer(
        &self,
        table: EntityTable,
    ) -> Result<jetstream::consumer::Consumer<pull::Config>, async_nats::Error> {
        let stream = self.context.get_stream(&self.settings.writes_stream).await?;
        let durable_name = format!("write-processor-{}", table.as_str());
        let consumer = stream
            .get_or_create_consumer(
                &durable_name,
                pull::Config {
                    durable_name: Some(durable_name.clone()),
                    filter_subject: self.writes_subject(table),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: Duration::from_secs(self.settings.ack_wait_secs),
                    max_deliver: self.settings.max_deliver,
                    ..Default::default()
                },
            )
            .await?;
        Ok(consumer)
    }

    /// The CDC consumer, filtered to the tables this pipeline caches.
    /// `deliver_policy: All` on first creation replays the whole stream;
    /// the durable cursor takes over from there, which is safe because
    /// namespace invalidation is idempotent regardless of how many times an
    /// event is redelivered.
    pub async fn cdc_consumer(
        &self,
        tables: &[EntityTable],
    ) -> Result<jetstream::consumer::Consumer<pull::Config>, async_nats::Error> {
        let stream = self.context.get_stream(&self.settings.cdc_stream).await?;
        let filter_subjects = tables.iter().map(|t| self.cdc_subject(*t)).collect();
        let consumer = stream
            .get_or_create_consumer(
                "cdc-consumer",
                pull::Config {
                    durable_name: Some("cdc-consumer".to_string()),
                    filter_subjects,
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    deliver_policy: jetstream::consumer::DeliverPolicy::All,
                    idle_heartbeat: Duration::from_secs(15),
                    ..Default::default()
                },
            )
            .await?;
        Ok(consumer)
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }
}

pub fn wrap(message: async_nats::jetstream::Message) -> DeliveredMessage {
    DeliveredMessage::new(message)
}
