use airbyte::{DestinationSyncMode, LogLevel};
use connector::clients::ApiClient;
use connector::destination::Destination;
use connector::test_utils::api::{ApiCall, MockApiClient};
use connector::test_utils::catalog::{StreamBuilder, catalog};
use connector::test_utils::config::destination_config;
use connector::test_utils::data_source::append_data_source;
use connector::test_utils::logger::MemoryLogger;
use connector::test_utils::messages::{record_line, state_line};
use connector::test_utils::oauth::MockOAuthClient;
use connector::test_utils::webhook::MockWebhookClient;
use connector::types::data_source_status;
use serde_json::json;
use telemetry::init_test_tracing;

fn overwrite_catalog() -> airbyte::ConfiguredCatalog {
    catalog(vec![
        StreamBuilder::new("public", "users")
            .mode(DestinationSyncMode::Overwrite)
            .build(),
        StreamBuilder::new("public", "orders")
            .mode(DestinationSyncMode::Overwrite)
            .build(),
    ])
}

#[tokio::test(start_paused = true)]
async fn overwrite_sync_without_records_deletes_every_table() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    api.add_data_source(append_data_source("public_orders")).await;
    let destination = Destination::new(
        MockOAuthClient::new(api.clone()),
        MockWebhookClient::new(),
        MemoryLogger::new(),
    );

    let input = state_line(json!({"reset": true}));
    let records = destination
        .write(
            &destination_config("secret"),
            &overwrite_catalog(),
            input.as_bytes(),
        )
        .await
        .unwrap();

    assert_eq!(records, 0);
    assert!(api.fetch_data_source("public_users").await.unwrap().is_none());
    assert!(api.fetch_data_source("public_orders").await.unwrap().is_none());
    assert!(api.fetch_data_pool("public_users").await.unwrap().is_none());
    assert!(api.fetch_data_pool("public_orders").await.unwrap().is_none());

    // Existing overwrite tables are purged before the input is read.
    assert_eq!(
        api.calls_of(|call| matches!(call, ApiCall::CreateDeletionJob(_)))
            .await,
        2
    );
    assert!(
        destination
            .logger()
            .contains(LogLevel::Info, "Full reset sync, all Data Pools will be deleted.")
    );
    assert_eq!(destination.logger().states().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tables_created_for_a_reset_are_deleted_again() {
    init_test_tracing();

    let api = MockApiClient::new();
    let destination = Destination::new(
        MockOAuthClient::new(api.clone()),
        MockWebhookClient::new(),
        MemoryLogger::new(),
    );

    destination
        .write(&destination_config("secret"), &overwrite_catalog(), &b""[..])
        .await
        .unwrap();

    assert_eq!(api.created_data_sources().await.len(), 2);
    assert_eq!(
        api.calls_of(|call| matches!(call, ApiCall::DeleteDataSource(_)))
            .await,
        2
    );
    assert!(api.fetch_data_source("public_users").await.unwrap().is_none());
    assert!(api.fetch_data_source("public_orders").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn overwrite_sync_with_records_keeps_the_tables() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    api.add_data_source(append_data_source("public_orders")).await;
    let webhook = MockWebhookClient::new();
    let destination = Destination::new(
        MockOAuthClient::new(api.clone()),
        webhook.clone(),
        MemoryLogger::new(),
    );

    let input = record_line("public", "users", json!({"id": 1}), 1_700_000_000_000);
    let records = destination
        .write(
            &destination_config("secret"),
            &overwrite_catalog(),
            input.as_bytes(),
        )
        .await
        .unwrap();

    assert_eq!(records, 1);
    assert_eq!(webhook.posted().await.len(), 1);
    assert_eq!(
        api.calls_of(|call| matches!(call, ApiCall::DeleteDataPool(_)))
            .await,
        0
    );
    let users = api.fetch_data_source("public_users").await.unwrap().unwrap();
    assert_eq!(users.status, data_source_status::CONNECTED);
}

#[tokio::test(start_paused = true)]
async fn mixed_sync_modes_never_reset() {
    init_test_tracing();

    let api = MockApiClient::new();
    api.add_data_source(append_data_source("public_users")).await;
    api.add_data_source(append_data_source("public_orders")).await;
    let destination = Destination::new(
        MockOAuthClient::new(api.clone()),
        MockWebhookClient::new(),
        MemoryLogger::new(),
    );
    let catalog = catalog(vec![
        StreamBuilder::new("public", "users")
            .mode(DestinationSyncMode::Overwrite)
            .build(),
        StreamBuilder::new("public", "orders").build(),
    ]);

    destination
        .write(&destination_config("secret"), &catalog, &b""[..])
        .await
        .unwrap();

    assert_eq!(
        api.calls_of(|call| matches!(
            call,
            ApiCall::DeleteDataPool(_) | ApiCall::DeleteDataSource(_)
        ))
        .await,
        0
    );
    assert!(
        !destination
            .logger()
            .contains(LogLevel::Info, "Full reset sync")
    );
}
