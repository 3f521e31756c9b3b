use airbyte::{DestinationSyncMode, LogLevel};
use connector::destination::Destination;
use connector::error::ErrorKind;
use connector::test_utils::api::{ApiCall, ApiFaults, MockApiClient};
use connector::test_utils::catalog::{StreamBuilder, catalog};
use connector::test_utils::config::destination_config;
use connector::test_utils::data_source::{append_data_source, webhook_url};
use connector::test_utils::logger::MemoryLogger;
use connector::test_utils::messages::{record_line, state_line};
use connector::test_utils::oauth::MockOAuthClient;
use connector::test_utils::webhook::{MockWebhookClient, WebhookFaults};
use connector::types::{
    EXTRACTED_AT_COLUMN, RAW_ID_COLUMN, ReplacingMergeTree, SizeHint, TableEvent,
};
use serde_json::{Value, json};
use telemetry::init_test_tracing;

const EMITTED_AT: i64 = 1_700_000_000_000;

type TestDestination = Destination<MockOAuthClient, MockWebhookClient, MemoryLogger>;

fn destination(api: &MockApiClient, webhook: &MockWebhookClient) -> TestDestination {
    Destination::new(
        MockOAuthClient::new(api.clone()),
        webhook.clone(),
        MemoryLogger::new(),
    )
}

fn users_record(id: u64) -> String {
    record_line("public", "users", json!({"id": id, "name": format!("user {id}")}), EMITTED_AT)
}

fn input(lines: &[String]) -> String {
    lines.join("\n")
}

#[tokio::test(start_paused = true)]
async fn dedup_stream_is_created_and_flushed_at_checkpoint() {
    init_test_tracing();

    let api = MockApiClient::new();
    let webhook = MockWebhookClient::new();
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![
        StreamBuilder::new("public", "users")
            .property("id", "integer")
            .property("name", "string")
            .property("updated_at", "string")
            .primary_key(&["id"])
            .cursor("updated_at")
            .mode(DestinationSyncMode::AppendDedup)
            .build(),
    ]);

    let mut lines: Vec<String> = (1..=8).map(users_record).collect();
    lines.push(state_line(json!({"cursor": 8})));

    let records = destination
        .write(
            &destination_config("secret"),
            &catalog,
            input(&lines).as_bytes(),
        )
        .await
        .unwrap();

    assert_eq!(records, 8);

    let created = api.created_data_sources().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "public_users");
    assert_eq!(created[0].unique_id.as_deref(), Some("id"));
    assert_eq!(created[0].timestamp, None);
    let table_settings = created[0].table_settings.clone().unwrap();
    assert_eq!(table_settings.order_by, vec!["id".to_string()]);
    assert_eq!(
        table_settings.engine,
        Some(ReplacingMergeTree {
            ver: "updated_at".to_string()
        })
    );

    let posted = webhook.posted().await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].webhook_url, webhook_url("public_users"));
    assert_eq!(posted[0].events.len(), 8);
    for event in &posted[0].events {
        assert!(event.contains_key(RAW_ID_COLUMN));
        assert_eq!(event[EXTRACTED_AT_COLUMN], json!(EMITTED_AT));
    }

    let states = destination.logger().states();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].0, json!({"cursor": 8}));
    assert!(
        destination
            .logger()
            .contains(LogLevel::Info, "Data Source public_users created and connected")
    );
}

#[tokio::test(start_paused = true)]
async fn byte_ceiling_splits_records_into_ordered_batches() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    let webhook = MockWebhookClient::new();
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![
        StreamBuilder::new("public", "users")
            .property("id", "integer")
            .property("name", "string")
            .build(),
    ]);

    // Every record below has the same delivered size.
    let event_size = TableEvent::new(
        "public",
        "users",
        0,
        EMITTED_AT,
        json!({"id": 1, "name": "user 1"})
            .as_object()
            .cloned()
            .unwrap(),
    )
    .unwrap()
    .size_hint();
    let mut config = destination_config("secret");
    config.batch.max_bytes = event_size * 3;

    let lines: Vec<String> = (1..=5).map(users_record).collect();
    let records = destination
        .write(&config, &catalog, input(&lines).as_bytes())
        .await
        .unwrap();

    assert_eq!(records, 5);

    let posted = webhook.posted().await;
    assert_eq!(posted.len(), 2);

    let ids: Vec<Vec<Value>> = posted
        .iter()
        .map(|batch| batch.events.iter().map(|event| event["id"].clone()).collect())
        .collect();
    assert_eq!(
        ids,
        vec![
            vec![json!(1), json!(2), json!(3)],
            vec![json!(4), json!(5)],
        ]
    );

    for batch in &posted {
        let batch_size: usize = batch
            .events
            .iter()
            .map(|event| serde_json::to_vec(event).unwrap().len() + 1)
            .sum();
        assert!(batch_size <= config.batch.max_bytes);
    }

    assert!(
        destination
            .logger()
            .contains(LogLevel::Debug, "Max batch size reached for Data Source public_users")
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_events_are_logged_without_failing_the_sync() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    let webhook = MockWebhookClient::with_faults(WebhookFaults {
        reject_event_indices: vec![2],
        fail_transport: false,
    });
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![StreamBuilder::new("public", "users").build()]);

    let lines: Vec<String> = (1..=5).map(users_record).collect();
    let records = destination
        .write(
            &destination_config("secret"),
            &catalog,
            input(&lines).as_bytes(),
        )
        .await
        .unwrap();

    assert_eq!(records, 5);
    assert_eq!(webhook.posted().await.len(), 1);

    let errors: Vec<_> = destination
        .logger()
        .logs()
        .into_iter()
        .filter(|log| log.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0]
            .message
            .starts_with("Failed to store event in Data Pool public_users")
    );
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_aborts_the_sync_before_the_checkpoint() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    let webhook = MockWebhookClient::with_faults(WebhookFaults {
        reject_event_indices: Vec::new(),
        fail_transport: true,
    });
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![StreamBuilder::new("public", "users").build()]);

    let lines = vec![users_record(1), state_line(json!({"cursor": 1}))];
    let err = destination
        .write(
            &destination_config("secret"),
            &catalog,
            input(&lines).as_bytes(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeliveryFailed);
    assert!(destination.logger().states().is_empty());
}

#[tokio::test(start_paused = true)]
async fn record_of_an_unconfigured_stream_is_fatal() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    let webhook = MockWebhookClient::new();
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![StreamBuilder::new("public", "users").build()]);

    let lines = vec![record_line(
        "public",
        "orders",
        json!({"id": 1}),
        EMITTED_AT,
    )];
    let err = destination
        .write(
            &destination_config("secret"),
            &catalog,
            input(&lines).as_bytes(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingTable);
    assert!(webhook.posted().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_stops_the_sync_before_any_table_call() {
    init_test_tracing();

    let webhook = MockWebhookClient::new();
    let destination = Destination::new(
        MockOAuthClient::rejecting(),
        webhook.clone(),
        MemoryLogger::new(),
    );
    let catalog = catalog(vec![StreamBuilder::new("public", "users").build()]);

    let err = destination
        .write(
            &destination_config("secret"),
            &catalog,
            users_record(1).as_bytes(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    assert!(webhook.posted().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn table_api_failure_stops_the_sync_before_reading_input() {
    init_test_tracing();

    let api = MockApiClient::with_faults(ApiFaults {
        fail_fetch_data_source: true,
        ..ApiFaults::default()
    });
    let webhook = MockWebhookClient::new();
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![StreamBuilder::new("public", "users").build()]);

    let err = destination
        .write(
            &destination_config("secret"),
            &catalog,
            users_record(1).as_bytes(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TableApiFailed);
    assert!(webhook.posted().await.is_empty());
    assert_eq!(
        api.calls_of(|call| matches!(call, ApiCall::CreateDataSource(_)))
            .await,
        0
    );
}

#[tokio::test(start_paused = true)]
async fn dedup_stream_over_an_append_table_is_rejected() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    let webhook = MockWebhookClient::new();
    let destination = destination(&api, &webhook);
    let catalog = catalog(vec![
        StreamBuilder::new("public", "users")
            .property("id", "integer")
            .property("updated_at", "string")
            .primary_key(&["id"])
            .cursor("updated_at")
            .mode(DestinationSyncMode::AppendDedup)
            .build(),
    ]);

    let err = destination
        .write(
            &destination_config("secret"),
            &catalog,
            users_record(1).as_bytes(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SyncModeMismatch);
    assert!(webhook.posted().await.is_empty());
}
