use std::fmt;
use std::future::Future;

use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::error::SyncResult;
use crate::types::{BasicAuth, CreateDataSourceOpts, DataPool, DataSource, FilterInput, Job};

/// Exchanges application credentials for an authenticated [`ApiClient`].
pub trait OAuthClient {
    /// Client returned on successful authentication.
    type Api: ApiClient;

    /// Requests an access token for the application and builds an API client using it.
    ///
    /// Fails with [`crate::error::ErrorKind::AuthenticationError`] when the credentials are
    /// rejected or the token endpoint cannot be reached.
    fn authenticate(
        &self,
        application_id: &str,
        application_secret: &SecretString,
    ) -> impl Future<Output = SyncResult<Self::Api>> + Send;
}

/// Operations on Propel Data Sources, Data Pools and deletion jobs.
///
/// Fetch operations report a missing resource as `Ok(None)`; every other failure is an error.
pub trait ApiClient {
    /// Creates a webhook Data Source. The returned Data Source is usually still connecting.
    fn create_data_source(
        &self,
        opts: &CreateDataSourceOpts,
    ) -> impl Future<Output = SyncResult<DataSource>> + Send;

    fn fetch_data_source(
        &self,
        unique_name: &str,
    ) -> impl Future<Output = SyncResult<Option<DataSource>>> + Send;

    fn fetch_data_pool(
        &self,
        unique_name: &str,
    ) -> impl Future<Output = SyncResult<Option<DataPool>>> + Send;

    /// Starts a job deleting the rows of a Data Pool matching every filter.
    fn create_deletion_job(
        &self,
        data_pool_id: &str,
        filters: &[FilterInput],
    ) -> impl Future<Output = SyncResult<Job>> + Send;

    fn fetch_deletion_job(&self, id: &str) -> impl Future<Output = SyncResult<Option<Job>>> + Send;

    /// Requests the deletion of a Data Pool, returning its id.
    fn delete_data_pool(&self, unique_name: &str)
    -> impl Future<Output = SyncResult<String>> + Send;

    /// Requests the deletion of a Data Source, returning its id.
    fn delete_data_source(
        &self,
        unique_name: &str,
    ) -> impl Future<Output = SyncResult<String>> + Send;
}

/// A batch of events posted to the webhook of a Data Source.
#[derive(Debug, Clone)]
pub struct PostEventsInput {
    pub webhook_url: String,
    pub basic_auth: Option<BasicAuth>,
    pub events: Vec<Map<String, Value>>,
}

/// Rejection of a single event of a posted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventError {
    /// Position of the rejected event inside the batch.
    pub index: usize,
    pub message: String,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {}: {}", self.index, self.message)
    }
}

/// Delivers event batches to Data Source webhooks.
pub trait WebhookClient {
    /// Posts every event of `input` in a single request.
    ///
    /// Events rejected individually are returned as [`EventError`]s and do not fail the call. A
    /// failure affecting the whole request fails with
    /// [`crate::error::ErrorKind::DeliveryFailed`].
    fn post_events(
        &self,
        input: PostEventsInput,
    ) -> impl Future<Output = SyncResult<Vec<EventError>>> + Send;
}
