//! HTTP clients for the Propel GraphQL API, its OAuth token endpoint and Data Source webhooks.

use std::time::Duration;

use config::shared::ApiConfig;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::clients::{ApiClient, EventError, OAuthClient, PostEventsInput, WebhookClient};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::sync_error;
use crate::types::{
    BasicAuth, CreateDataSourceOpts, DataPool, DataSource, FilterInput, Job, TableSettings,
};

/// Timeout applied to every HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const DATA_SOURCE_FIELDS: &str = r#"
    id
    uniqueName
    status
    connectionSettings {
      ... on WebhookConnectionSettings {
        webhookUrl
        basicAuth { username password }
        columns { name type nullable jsonProperty }
        timestamp
        uniqueId
        tableSettings {
          primaryKey
          partitionBy
          orderBy
          engine { ... on ReplacingMergeTreeTableEngine { ver } }
        }
      }
    }
"#;

/// Errors raised by the HTTP clients before they are classified into a [`SyncError`].
#[derive(Debug, Error)]
pub enum PropelClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("GraphQL request failed: {0}")]
    GraphQl(String),

    #[error("response has no `{0}` field")]
    MissingField(&'static str),

    #[error("response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

fn http_client() -> Result<reqwest::Client, PropelClientError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    Ok(client)
}

/// Obtains access tokens with the OAuth client credentials grant.
#[derive(Debug, Clone)]
pub struct PropelOAuthClient {
    http: reqwest::Client,
    oauth_url: String,
    api_url: String,
}

impl PropelOAuthClient {
    pub fn new(config: &ApiConfig) -> Result<Self, PropelClientError> {
        Ok(Self {
            http: http_client()?,
            oauth_url: config.oauth_url.clone(),
            api_url: config.api_url.clone(),
        })
    }

    async fn request_token(
        &self,
        application_id: &str,
        application_secret: &SecretString,
    ) -> Result<SecretString, PropelClientError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let response = self
            .http
            .post(&self.oauth_url)
            .basic_auth(application_id, Some(application_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let response = error_for_status(response).await?;
        let token: TokenResponse = response.json().await?;

        Ok(SecretString::new(token.access_token))
    }
}

impl OAuthClient for PropelOAuthClient {
    type Api = PropelApiClient;

    async fn authenticate(
        &self,
        application_id: &str,
        application_secret: &SecretString,
    ) -> SyncResult<PropelApiClient> {
        debug!(application_id, "requesting access token");

        let access_token = self
            .request_token(application_id, application_secret)
            .await
            .map_err(|err| {
                sync_error!(
                    ErrorKind::AuthenticationError,
                    "Generating an access token failed",
                    format!("application {application_id}"),
                    source: err
                )
            })?;

        Ok(PropelApiClient {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            access_token,
        })
    }
}

/// Client for the Propel GraphQL API authenticated with an access token.
#[derive(Debug, Clone)]
pub struct PropelApiClient {
    http: reqwest::Client,
    api_url: String,
    access_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    code: Option<String>,
}

impl GraphQlError {
    fn is_not_found(&self) -> bool {
        let code_not_found = self
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.code.as_deref())
            == Some("NOT_FOUND");

        code_not_found || self.message.to_ascii_lowercase().contains("not found")
    }
}

/// Outcome of a GraphQL operation whose errors were inspected.
#[derive(Debug)]
enum GraphQlOutcome {
    Data(Value),
    NotFound,
}

impl GraphQlResponse {
    fn into_outcome(self) -> Result<GraphQlOutcome, PropelClientError> {
        if !self.errors.is_empty() {
            if self.errors.iter().all(GraphQlError::is_not_found) {
                return Ok(GraphQlOutcome::NotFound);
            }

            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(PropelClientError::GraphQl(messages.join("; ")));
        }

        Ok(GraphQlOutcome::Data(self.data.unwrap_or(Value::Null)))
    }
}

/// Extracts and decodes the top-level field `name` of a GraphQL `data` object.
///
/// A `null` field is reported as `None`.
fn take_field<T: DeserializeOwned>(
    mut data: Value,
    name: &'static str,
) -> Result<Option<T>, PropelClientError> {
    match data.get_mut(name).map(Value::take) {
        None => Err(PropelClientError::MissingField(name)),
        Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

fn table_settings_input(settings: &TableSettings) -> Value {
    let mut input = json!({
        "primaryKey": settings.primary_key,
        "partitionBy": settings.partition_by,
        "orderBy": settings.order_by,
    });

    if let Some(engine) = &settings.engine {
        input["engine"] = json!({
            "replacingMergeTree": {
                "type": "REPLACING_MERGE_TREE",
                "ver": engine.ver,
            }
        });
    }

    input
}

fn create_data_source_input(opts: &CreateDataSourceOpts) -> Value {
    let mut connection_settings = json!({
        "basicAuth": {
            "username": opts.basic_auth.username,
            "password": opts.basic_auth.password.expose_secret(),
        },
        "columns": opts.columns,
    });

    if let Some(timestamp) = &opts.timestamp {
        connection_settings["timestamp"] = json!(timestamp);
    }
    if let Some(unique_id) = &opts.unique_id {
        connection_settings["uniqueId"] = json!(unique_id);
    }
    if let Some(settings) = &opts.table_settings {
        connection_settings["tableSettings"] = table_settings_input(settings);
    }

    json!({
        "uniqueName": opts.name,
        "connectionSettings": connection_settings,
    })
}

fn filters_input(filters: &[FilterInput]) -> Value {
    filters
        .iter()
        .map(|filter| {
            json!({
                "column": filter.column,
                "operator": filter.operator.as_str(),
                "value": filter.value,
            })
        })
        .collect()
}

fn api_error(description: &'static str, detail: String, err: PropelClientError) -> SyncError {
    sync_error!(ErrorKind::TableApiFailed, description, detail, source: err)
}

impl PropelApiClient {
    async fn execute(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<GraphQlOutcome, PropelClientError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let response = error_for_status(response).await?;
        let body: GraphQlResponse = response.json().await?;

        body.into_outcome()
    }

    /// Runs an operation that must return the field `name`.
    async fn mutate<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        name: &'static str,
    ) -> Result<T, PropelClientError> {
        match self.execute(query, variables).await? {
            GraphQlOutcome::Data(data) => {
                take_field(data, name)?.ok_or(PropelClientError::MissingField(name))
            }
            GraphQlOutcome::NotFound => Err(PropelClientError::GraphQl(format!(
                "resource referenced by `{name}` was not found"
            ))),
        }
    }

    /// Runs a lookup that reports a missing resource as `None`.
    async fn lookup<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        name: &'static str,
    ) -> Result<Option<T>, PropelClientError> {
        match self.execute(query, variables).await? {
            GraphQlOutcome::Data(data) => take_field(data, name),
            GraphQlOutcome::NotFound => Ok(None),
        }
    }
}

impl ApiClient for PropelApiClient {
    async fn create_data_source(&self, opts: &CreateDataSourceOpts) -> SyncResult<DataSource> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            data_source: DataSource,
        }

        let query = format!(
            "mutation CreateWebhookDataSource($input: CreateWebhookDataSourceInput!) {{
               createWebhookDataSource(input: $input) {{ dataSource {{ {DATA_SOURCE_FIELDS} }} }}
             }}"
        );

        debug!(data_source = %opts.name, "creating data source");

        let payload: Payload = self
            .mutate(
                &query,
                json!({ "input": create_data_source_input(opts) }),
                "createWebhookDataSource",
            )
            .await
            .map_err(|err| {
                api_error(
                    "Data Source creation failed",
                    format!("data source {}", opts.name),
                    err,
                )
            })?;

        Ok(payload.data_source)
    }

    async fn fetch_data_source(&self, unique_name: &str) -> SyncResult<Option<DataSource>> {
        let query = format!(
            "query DataSourceByName($uniqueName: String!) {{
               dataSourceByName(uniqueName: $uniqueName) {{ {DATA_SOURCE_FIELDS} }}
             }}"
        );

        self.lookup(
            &query,
            json!({ "uniqueName": unique_name }),
            "dataSourceByName",
        )
        .await
        .map_err(|err| {
            api_error(
                "Fetching the Data Source failed",
                format!("data source {unique_name}"),
                err,
            )
        })
    }

    async fn fetch_data_pool(&self, unique_name: &str) -> SyncResult<Option<DataPool>> {
        const QUERY: &str = "query DataPoolByName($uniqueName: String!) {
            dataPoolByName(uniqueName: $uniqueName) { id uniqueName status }
        }";

        self.lookup(QUERY, json!({ "uniqueName": unique_name }), "dataPoolByName")
            .await
            .map_err(|err| {
                api_error(
                    "Fetching the Data Pool failed",
                    format!("data pool {unique_name}"),
                    err,
                )
            })
    }

    async fn create_deletion_job(
        &self,
        data_pool_id: &str,
        filters: &[FilterInput],
    ) -> SyncResult<Job> {
        #[derive(Deserialize)]
        struct Payload {
            job: Job,
        }

        const QUERY: &str = "mutation CreateDeletionJob($input: CreateDeletionJobInput!) {
            createDeletionJob(input: $input) { job { id status } }
        }";

        debug!(data_pool_id, "creating deletion job");

        let input = json!({ "dataPool": data_pool_id, "filters": filters_input(filters) });
        let payload: Payload = self
            .mutate(QUERY, json!({ "input": input }), "createDeletionJob")
            .await
            .map_err(|err| {
                api_error(
                    "Deletion Job creation failed",
                    format!("data pool {data_pool_id}"),
                    err,
                )
            })?;

        Ok(payload.job)
    }

    async fn fetch_deletion_job(&self, id: &str) -> SyncResult<Option<Job>> {
        const QUERY: &str = "query DeletionJob($id: ID!) { deletionJob(id: $id) { id status } }";

        self.lookup(QUERY, json!({ "id": id }), "deletionJob")
            .await
            .map_err(|err| {
                api_error(
                    "Fetching the Deletion Job failed",
                    format!("job {id}"),
                    err,
                )
            })
    }

    async fn delete_data_pool(&self, unique_name: &str) -> SyncResult<String> {
        const QUERY: &str = "mutation DeleteDataPool($uniqueName: String!) {
            deleteDataPoolByName(uniqueName: $uniqueName)
        }";

        debug!(data_pool = %unique_name, "deleting data pool");

        self.mutate(
            QUERY,
            json!({ "uniqueName": unique_name }),
            "deleteDataPoolByName",
        )
        .await
        .map_err(|err| {
            api_error(
                "Data Pool deletion failed",
                format!("data pool {unique_name}"),
                err,
            )
        })
    }

    async fn delete_data_source(&self, unique_name: &str) -> SyncResult<String> {
        const QUERY: &str = "mutation DeleteDataSource($uniqueName: String!) {
            deleteDataSourceByName(uniqueName: $uniqueName)
        }";

        debug!(data_source = %unique_name, "deleting data source");

        self.mutate(
            QUERY,
            json!({ "uniqueName": unique_name }),
            "deleteDataSourceByName",
        )
        .await
        .map_err(|err| {
            api_error(
                "Data Source deletion failed",
                format!("data source {unique_name}"),
                err,
            )
        })
    }
}

/// Posts event batches to Data Source webhooks.
#[derive(Debug, Clone)]
pub struct PropelWebhookClient {
    http: reqwest::Client,
}

impl PropelWebhookClient {
    pub fn new() -> Result<Self, PropelClientError> {
        Ok(Self {
            http: http_client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WebhookErrorResponse {
    errors: Vec<WebhookEventError>,
}

#[derive(Debug, Deserialize)]
struct WebhookEventError {
    index: usize,
    message: String,
}

/// Splits a rejected webhook response into per-event errors.
///
/// Returns `None` when the body does not list rejected events, in which case the whole request
/// failed.
fn event_errors(status: StatusCode, body: &str) -> Option<Vec<EventError>> {
    if !status.is_client_error() || matches!(status.as_u16(), 401 | 403 | 404 | 413) {
        return None;
    }

    let response: WebhookErrorResponse = serde_json::from_str(body).ok()?;
    if response.errors.is_empty() {
        return None;
    }

    Some(
        response
            .errors
            .into_iter()
            .map(|error| EventError {
                index: error.index,
                message: error.message,
            })
            .collect(),
    )
}

impl PropelWebhookClient {
    async fn send(&self, input: &PostEventsInput) -> Result<Vec<EventError>, PropelClientError> {
        let mut request = self.http.post(&input.webhook_url).json(&input.events);
        if let Some(BasicAuth { username, password }) = &input.basic_auth {
            request = request.basic_auth(username, Some(password.expose_secret()));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read body>".to_string());

        event_errors(status, &body).ok_or(PropelClientError::Status { status, body })
    }
}

impl WebhookClient for PropelWebhookClient {
    async fn post_events(&self, input: PostEventsInput) -> SyncResult<Vec<EventError>> {
        debug!(events = input.events.len(), "posting events");

        self.send(&input).await.map_err(|err| {
            sync_error!(
                ErrorKind::DeliveryFailed,
                "Posting events to the webhook failed",
                format!("{} events to {}", input.events.len(), input.webhook_url),
                source: err
            )
        })
    }
}

async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, PropelClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unable to read body>".to_string());

    Err(PropelClientError::Status { status, body })
}
