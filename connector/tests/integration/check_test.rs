use airbyte::{CheckStatus, LogLevel};
use connector::destination::Destination;
use connector::test_utils::api::MockApiClient;
use connector::test_utils::config::destination_config;
use connector::test_utils::logger::MemoryLogger;
use connector::test_utils::oauth::MockOAuthClient;
use connector::test_utils::webhook::MockWebhookClient;
use telemetry::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn check_with_valid_credentials_succeeds_without_touching_tables() {
    init_test_tracing();

    let api = MockApiClient::new();
    let destination = Destination::new(
        MockOAuthClient::new(api.clone()),
        MockWebhookClient::new(),
        MemoryLogger::new(),
    );

    let status = destination.check(&destination_config("secret")).await;

    assert_eq!(status.status, CheckStatus::Succeeded);
    assert_eq!(
        status.message.as_deref(),
        Some("Successfully generated a Propel access token")
    );
    assert!(api.calls().await.is_empty());
    assert!(
        destination
            .logger()
            .contains(LogLevel::Debug, "Validating API connection")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn check_with_rejected_credentials_fails_and_logs_the_error() {
    init_test_tracing();

    let destination = Destination::new(
        MockOAuthClient::rejecting(),
        MockWebhookClient::new(),
        MemoryLogger::new(),
    );

    let status = destination.check(&destination_config("secret")).await;

    assert_eq!(status.status, CheckStatus::Failed);
    assert!(destination.logger().contains(LogLevel::Error, "APP123"));
}
