use std::collections::BTreeMap;

use airbyte::{LogLevel, Logger, Message, Record};
use config::shared::BatchConfig;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::batching::BatchBuffer;
use crate::bail;
use crate::clients::{PostEventsInput, WebhookClient};
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::types::{DataSource, TableEvent, data_source_unique_name};

/// Reads the input message stream and delivers its records to the reconciled Data Sources.
///
/// Messages are handled strictly in arrival order. Each Data Source owns one [`BatchBuffer`];
/// a checkpoint flushes every buffer, in unique name order, before it is forwarded.
#[derive(Debug)]
pub struct BatchingPipeline<'a, W, L> {
    webhook: &'a W,
    logger: &'a L,
    config: &'a BatchConfig,
    tables: &'a BTreeMap<String, DataSource>,
    buffers: BTreeMap<String, BatchBuffer>,
    record_index: u64,
}

impl<'a, W, L> BatchingPipeline<'a, W, L>
where
    W: WebhookClient,
    L: Logger,
{
    pub fn new(
        webhook: &'a W,
        logger: &'a L,
        config: &'a BatchConfig,
        tables: &'a BTreeMap<String, DataSource>,
    ) -> Self {
        let buffers = tables
            .keys()
            .map(|unique_name| (unique_name.clone(), BatchBuffer::new()))
            .collect();

        Self {
            webhook,
            logger,
            config,
            tables,
            buffers,
            record_index: 0,
        }
    }

    /// Consumes newline-delimited messages from `input` until it ends.
    ///
    /// Returns the number of records processed. Blank lines are skipped and message kinds other
    /// than records and checkpoints are ignored. The first malformed line, record of an unknown
    /// stream or failed delivery aborts the run; events rejected individually by a webhook are
    /// logged and skipped.
    pub async fn run<R>(mut self, input: R) -> SyncResult<u64>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut line_number = 0u64;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let message: Message = serde_json::from_str(&line).map_err(|err| {
                sync_error!(
                    ErrorKind::DeserializationError,
                    "Input message could not be parsed",
                    format!("line {line_number}"),
                    source: err
                )
            })?;

            match message {
                Message::Record { record } => self.write_record(record).await?,
                Message::State { state } => {
                    self.flush_all().await?;
                    self.logger.state(&state)?;
                }
                other => debug!(kind = other.kind(), "ignoring message"),
            }
        }

        self.flush_all().await?;

        info!(records = self.record_index, "input stream processed");

        Ok(self.record_index)
    }

    async fn write_record(&mut self, record: Record) -> SyncResult<()> {
        let unique_name = data_source_unique_name(&record.namespace, &record.stream);
        let (Some(data_source), Some(buffer)) = (
            self.tables.get(&unique_name),
            self.buffers.get_mut(&unique_name),
        ) else {
            bail!(
                ErrorKind::MissingTable,
                "Record belongs to a stream that was not configured",
                format!("data source {unique_name}")
            );
        };

        let event = TableEvent::new(
            &record.namespace,
            &record.stream,
            self.record_index,
            record.emitted_at,
            record.data,
        )?;

        if buffer.needs_flush_before(&event, self.config) {
            self.logger.log(
                LogLevel::Debug,
                format!("Max batch size reached for Data Source {unique_name}"),
            );
            flush_buffer(self.webhook, self.logger, data_source, buffer).await?;
        }

        buffer.push(event);
        self.record_index += 1;

        Ok(())
    }

    async fn flush_all(&mut self) -> SyncResult<()> {
        for (unique_name, buffer) in self.buffers.iter_mut() {
            let Some(data_source) = self.tables.get(unique_name) else {
                continue;
            };

            flush_buffer(self.webhook, self.logger, data_source, buffer).await?;
        }

        Ok(())
    }
}

/// Posts the content of `buffer` to the webhook of `data_source` and empties it.
///
/// Flushing an empty buffer does nothing.
async fn flush_buffer<W, L>(
    webhook: &W,
    logger: &L,
    data_source: &DataSource,
    buffer: &mut BatchBuffer,
) -> SyncResult<()>
where
    W: WebhookClient,
    L: Logger,
{
    if buffer.is_empty() {
        return Ok(());
    }

    let size_bytes = buffer.size_bytes();
    let events: Vec<Map<String, Value>> = buffer
        .take()
        .into_iter()
        .map(TableEvent::into_payload)
        .collect();
    let batch_len = events.len();

    let input = PostEventsInput {
        webhook_url: data_source.webhook_url().to_string(),
        basic_auth: data_source.connection_settings.basic_auth.clone(),
        events,
    };

    let rejected = webhook.post_events(input).await.map_err(|err| {
        sync_error!(
            ErrorKind::DeliveryFailed,
            "Publishing a batch failed",
            format!(
                "{batch_len} events for data source {}",
                data_source.unique_name
            ),
            source: err
        )
    })?;

    for event_error in &rejected {
        logger.log(
            LogLevel::Error,
            format!(
                "Failed to store event in Data Pool {}: {event_error}",
                data_source.unique_name
            ),
        );
    }

    debug!(
        data_source = %data_source.unique_name,
        events = batch_len,
        size_bytes,
        rejected = rejected.len(),
        "batch published"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use airbyte::State;
    use serde_json::json;

    use super::*;
    use crate::test_utils::data_source::append_data_source;
    use crate::test_utils::logger::MemoryLogger;
    use crate::test_utils::messages::{record_line, state_line};
    use crate::test_utils::webhook::{MockWebhookClient, WebhookFaults};
    use crate::types::{EXTRACTED_AT_COLUMN, RAW_ID_COLUMN, SizeHint, raw_id};

    fn tables(names: &[&str]) -> BTreeMap<String, DataSource> {
        names
            .iter()
            .map(|name| (name.to_string(), append_data_source(name)))
            .collect()
    }

    async fn run(
        webhook: &MockWebhookClient,
        logger: &MemoryLogger,
        config: &BatchConfig,
        tables: &BTreeMap<String, DataSource>,
        input: &str,
    ) -> SyncResult<u64> {
        BatchingPipeline::new(webhook, logger, config, tables)
            .run(input.as_bytes())
            .await
    }

    #[tokio::test]
    async fn records_are_buffered_until_the_input_ends() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let input = [
            record_line("public", "users", json!({"id": 1}), 100),
            record_line("public", "users", json!({"id": 2}), 200),
        ]
        .join("\n");

        let records = run(&webhook, &logger, &BatchConfig::default(), &tables, &input)
            .await
            .unwrap();

        assert_eq!(records, 2);
        let posted = webhook.posted().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].webhook_url, tables["public_users"].webhook_url());
        assert_eq!(
            posted[0].basic_auth.as_ref().map(|auth| auth.username.as_str()),
            Some("public")
        );
        assert_eq!(
            posted[0].events[1],
            json!({
                "id": 2,
                RAW_ID_COLUMN: raw_id("public", "users", 1, 200),
                EXTRACTED_AT_COLUMN: 200,
            })
            .as_object()
            .cloned()
            .unwrap()
        );
    }

    #[tokio::test]
    async fn record_without_namespace_goes_to_the_unprefixed_table() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["_users"]);
        let input = r#"{"type":"RECORD","record":{"namespace":null,"stream":"users","data":{"id":1},"emitted_at":1}}"#;

        let records = run(&webhook, &logger, &BatchConfig::default(), &tables, input)
            .await
            .unwrap();

        assert_eq!(records, 1);
        let posted = webhook.posted().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].webhook_url, tables["_users"].webhook_url());
        assert_eq!(posted[0].events[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn checkpoint_flushes_before_it_is_forwarded() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_a", "public_b"]);
        let input = [
            record_line("public", "b", json!({"id": 1}), 1),
            record_line("public", "a", json!({"id": 2}), 2),
            state_line(json!({"cursor": 2})),
            "this is not json".to_string(),
        ]
        .join("\n");

        let err = run(&webhook, &logger, &BatchConfig::default(), &tables, &input)
            .await
            .unwrap_err();

        // The end of input is never reached, so both batches were posted by the checkpoint.
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
        assert_eq!(err.detail(), Some("line 4"));
        let posted = webhook.posted().await;
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].webhook_url, tables["public_a"].webhook_url());
        assert_eq!(posted[1].webhook_url, tables["public_b"].webhook_url());
        assert_eq!(logger.states(), vec![State(json!({"cursor": 2}))]);
    }

    #[tokio::test]
    async fn checkpoint_with_empty_buffers_is_forwarded() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let input = format!("{}\n\n{}\n", state_line(json!(1)), state_line(json!(2)));

        let records = run(&webhook, &logger, &BatchConfig::default(), &tables, &input)
            .await
            .unwrap();

        assert_eq!(records, 0);
        assert!(webhook.posted().await.is_empty());
        assert_eq!(logger.states(), vec![State(json!(1)), State(json!(2))]);
    }

    #[tokio::test]
    async fn byte_ceiling_splits_batches_in_input_order() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let lines: Vec<String> = (0..6)
            .map(|i| record_line("public", "users", json!({"id": i, "pad": "x".repeat(50)}), 1))
            .collect();
        let event_size = TableEvent::new(
            "public",
            "users",
            0,
            1,
            json!({"id": 0, "pad": "x".repeat(50)})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap()
        .size_hint();
        // Room for three events per batch.
        let config = BatchConfig {
            max_bytes: event_size * 3 + 2,
            max_records: 100,
        };
        let input = format!("{}\n{}", lines.join("\n"), state_line(json!("done")));

        run(&webhook, &logger, &config, &tables, &input).await.unwrap();

        let posted = webhook.posted().await;
        assert_eq!(posted.len(), 2);
        let ids: Vec<Vec<Value>> = posted
            .iter()
            .map(|batch| batch.events.iter().map(|event| event["id"].clone()).collect())
            .collect();
        assert_eq!(
            ids,
            vec![
                vec![json!(0), json!(1), json!(2)],
                vec![json!(3), json!(4), json!(5)]
            ]
        );
        for batch in &posted {
            let size: usize = batch
                .events
                .iter()
                .map(|event| serde_json::to_vec(event).unwrap().len() + 1)
                .sum();
            assert!(size <= config.max_bytes);
        }
        assert!(logger.contains(LogLevel::Debug, "Max batch size reached"));
    }

    #[tokio::test]
    async fn record_ceiling_caps_batch_length() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let input = (0..7)
            .map(|i| record_line("public", "users", json!({"id": i}), 1))
            .collect::<Vec<_>>()
            .join("\n");
        let config = BatchConfig {
            max_bytes: BatchConfig::DEFAULT_MAX_BYTES,
            max_records: 3,
        };

        let records = run(&webhook, &logger, &config, &tables, &input).await.unwrap();

        assert_eq!(records, 7);
        let lengths: Vec<usize> = webhook
            .posted()
            .await
            .iter()
            .map(|batch| batch.events.len())
            .collect();
        assert_eq!(lengths, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn rejected_events_are_logged_and_skipped() {
        let webhook = MockWebhookClient::with_faults(WebhookFaults {
            reject_event_indices: vec![2],
            ..WebhookFaults::default()
        });
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let mut lines: Vec<String> = (0..5)
            .map(|i| record_line("public", "users", json!({"id": i}), 1))
            .collect();
        lines.push(state_line(json!({"after": "rejection"})));

        let records = run(
            &webhook,
            &logger,
            &BatchConfig::default(),
            &tables,
            &lines.join("\n"),
        )
        .await
        .unwrap();

        assert_eq!(records, 5);
        assert_eq!(
            logger
                .logs()
                .iter()
                .filter(|log| log.level == LogLevel::Error)
                .count(),
            1
        );
        assert_eq!(logger.states().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_aborts_the_run() {
        let webhook = MockWebhookClient::with_faults(WebhookFaults {
            fail_transport: true,
            ..WebhookFaults::default()
        });
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let input = [
            record_line("public", "users", json!({"id": 1}), 1),
            state_line(json!({})),
        ]
        .join("\n");

        let err = run(&webhook, &logger, &BatchConfig::default(), &tables, &input)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeliveryFailed);
        assert_eq!(err.detail(), Some("1 events for data source public_users"));
        assert!(logger.states().is_empty());
    }

    #[tokio::test]
    async fn record_of_unknown_stream_is_fatal() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let input = record_line("public", "orders", json!({"id": 1}), 1);

        let err = run(&webhook, &logger, &BatchConfig::default(), &tables, &input)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingTable);
    }

    #[tokio::test]
    async fn passthrough_messages_are_ignored() {
        let webhook = MockWebhookClient::new();
        let logger = MemoryLogger::new();
        let tables = tables(&["public_users"]);
        let input = [
            json!({"type": "LOG", "log": {"level": "INFO", "message": "hello"}}).to_string(),
            json!({"type": "TRACE", "trace": {"type": "ERROR"}}).to_string(),
            record_line("public", "users", json!({"id": 1}), 1),
        ]
        .join("\n");

        let records = run(&webhook, &logger, &BatchConfig::default(), &tables, &input)
            .await
            .unwrap();

        assert_eq!(records, 1);
        assert!(logger.logs().is_empty());
    }
}
