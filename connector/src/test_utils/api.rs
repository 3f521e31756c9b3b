use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::clients::ApiClient;
use crate::error::{ErrorKind, SyncResult};
use crate::test_utils::data_source::webhook_url;
use crate::types::{
    CreateDataSourceOpts, DataPool, DataSource, FilterInput, Job, WebhookConnectionSettings,
    data_pool_status, data_source_status, job_status,
};

/// A call received by [`MockApiClient`], with the name or id it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateDataSource(String),
    FetchDataSource(String),
    FetchDataPool(String),
    CreateDeletionJob(String),
    FetchDeletionJob(String),
    DeleteDataPool(String),
    DeleteDataSource(String),
}

/// Operations of [`MockApiClient`] that fail on every call.
#[derive(Debug, Clone, Default)]
pub struct ApiFaults {
    pub fail_create_data_source: bool,
    pub fail_fetch_data_source: bool,
    pub fail_fetch_data_pool: bool,
    pub fail_create_deletion_job: bool,
    pub fail_delete: bool,
}

#[derive(Debug)]
struct Inner {
    data_sources: BTreeMap<String, DataSource>,
    data_pools: BTreeMap<String, DataPool>,
    jobs: BTreeMap<String, VecDeque<String>>,
    connecting: BTreeMap<String, VecDeque<String>>,
    job_statuses: Vec<String>,
    connect_statuses: Vec<String>,
    created: Vec<CreateDataSourceOpts>,
    deletion_job_filters: Vec<FilterInput>,
    calls: Vec<ApiCall>,
    next_job_id: u64,
    faults: ApiFaults,
}

/// Advances a scripted status sequence, repeating its last status forever.
fn next_status(statuses: &mut VecDeque<String>) -> Option<String> {
    if statuses.len() > 1 {
        statuses.pop_front()
    } else {
        statuses.front().cloned()
    }
}

/// In-memory [`ApiClient`] simulating the lifecycle of Propel resources.
///
/// A created Data Source reports `CONNECTING` then `CONNECTED` on its next fetches, deletion jobs
/// report `SUCCEEDED` and a deleted resource is reported as `DELETING` once before it disappears.
/// Status sequences can be scripted with [`MockApiClient::set_connect_statuses`] and
/// [`MockApiClient::set_job_statuses`]. Clones share the same state.
#[derive(Debug, Clone)]
pub struct MockApiClient {
    inner: Arc<Mutex<Inner>>,
}

impl MockApiClient {
    pub fn new() -> Self {
        Self::with_faults(ApiFaults::default())
    }

    pub fn with_faults(faults: ApiFaults) -> Self {
        let inner = Inner {
            data_sources: BTreeMap::new(),
            data_pools: BTreeMap::new(),
            jobs: BTreeMap::new(),
            connecting: BTreeMap::new(),
            job_statuses: vec![job_status::SUCCEEDED.to_string()],
            connect_statuses: vec![
                data_source_status::CONNECTING.to_string(),
                data_source_status::CONNECTED.to_string(),
            ],
            created: Vec::new(),
            deletion_job_filters: Vec::new(),
            calls: Vec::new(),
            next_job_id: 1,
            faults,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Registers an existing Data Source together with its Data Pool.
    pub async fn add_data_source(&self, data_source: DataSource) {
        let mut inner = self.inner.lock().await;
        let unique_name = data_source.unique_name.clone();

        inner.data_pools.insert(
            unique_name.clone(),
            DataPool {
                id: format!("POOL-{unique_name}"),
                unique_name: unique_name.clone(),
                status: "LIVE".to_string(),
            },
        );
        inner.data_sources.insert(unique_name, data_source);
    }

    /// Sets the statuses reported by deletion jobs created from now on.
    pub async fn set_job_statuses(&self, statuses: &[&str]) {
        self.inner.lock().await.job_statuses = statuses.iter().map(|s| s.to_string()).collect();
    }

    /// Sets the statuses reported by Data Sources created from now on.
    pub async fn set_connect_statuses(&self, statuses: &[&str]) {
        self.inner.lock().await.connect_statuses =
            statuses.iter().map(|s| s.to_string()).collect();
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Counts the received calls matching `predicate`.
    pub async fn calls_of(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    pub async fn created_data_sources(&self) -> Vec<CreateDataSourceOpts> {
        self.inner.lock().await.created.clone()
    }

    pub async fn deletion_job_filters(&self) -> Vec<FilterInput> {
        self.inner.lock().await.deletion_job_filters.clone()
    }
}

impl Default for MockApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient for MockApiClient {
    async fn create_data_source(&self, opts: &CreateDataSourceOpts) -> SyncResult<DataSource> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ApiCall::CreateDataSource(opts.name.clone()));

        if inner.faults.fail_create_data_source {
            bail!(
                ErrorKind::TableApiFailed,
                "Injected Data Source creation failure",
                format!("data source {}", opts.name)
            );
        }

        let data_source = DataSource {
            id: format!("DSO-{}", opts.name),
            unique_name: opts.name.clone(),
            status: data_source_status::CREATED.to_string(),
            connection_settings: WebhookConnectionSettings {
                webhook_url: webhook_url(&opts.name),
                basic_auth: Some(opts.basic_auth.clone()),
                columns: opts.columns.clone(),
                timestamp: opts.timestamp.clone(),
                unique_id: opts.unique_id.clone(),
                table_settings: opts.table_settings.clone(),
            },
        };

        let connecting = inner.connect_statuses.iter().cloned().collect();
        inner.connecting.insert(opts.name.clone(), connecting);
        inner.data_pools.insert(
            opts.name.clone(),
            DataPool {
                id: format!("POOL-{}", opts.name),
                unique_name: opts.name.clone(),
                status: "LIVE".to_string(),
            },
        );
        inner
            .data_sources
            .insert(opts.name.clone(), data_source.clone());
        inner.created.push(opts.clone());

        Ok(data_source)
    }

    async fn fetch_data_source(&self, unique_name: &str) -> SyncResult<Option<DataSource>> {
        let mut inner = self.inner.lock().await;
        inner
            .calls
            .push(ApiCall::FetchDataSource(unique_name.to_string()));

        if inner.faults.fail_fetch_data_source {
            bail!(
                ErrorKind::TableApiFailed,
                "Injected Data Source fetch failure",
                format!("data source {unique_name}")
            );
        }

        let status = inner.connecting.get_mut(unique_name).and_then(next_status);
        let Some(data_source) = inner.data_sources.get_mut(unique_name) else {
            return Ok(None);
        };
        if let Some(status) = status {
            data_source.status = status;
        }

        let data_source = data_source.clone();
        if data_source.status == data_source_status::DELETING {
            inner.data_sources.remove(unique_name);
            inner.connecting.remove(unique_name);
        }

        Ok(Some(data_source))
    }

    async fn fetch_data_pool(&self, unique_name: &str) -> SyncResult<Option<DataPool>> {
        let mut inner = self.inner.lock().await;
        inner
            .calls
            .push(ApiCall::FetchDataPool(unique_name.to_string()));

        if inner.faults.fail_fetch_data_pool {
            bail!(
                ErrorKind::TableApiFailed,
                "Injected Data Pool fetch failure",
                format!("data pool {unique_name}")
            );
        }

        let Some(data_pool) = inner.data_pools.get(unique_name).cloned() else {
            return Ok(None);
        };
        if data_pool.status == data_pool_status::DELETING {
            inner.data_pools.remove(unique_name);
        }

        Ok(Some(data_pool))
    }

    async fn create_deletion_job(
        &self,
        data_pool_id: &str,
        filters: &[FilterInput],
    ) -> SyncResult<Job> {
        let mut inner = self.inner.lock().await;
        inner
            .calls
            .push(ApiCall::CreateDeletionJob(data_pool_id.to_string()));

        if inner.faults.fail_create_deletion_job {
            bail!(
                ErrorKind::TableApiFailed,
                "Injected Deletion Job creation failure",
                format!("data pool {data_pool_id}")
            );
        }

        let id = format!("JOB-{}", inner.next_job_id);
        inner.next_job_id += 1;

        let statuses = inner.job_statuses.iter().cloned().collect();
        inner.jobs.insert(id.clone(), statuses);
        inner.deletion_job_filters.extend_from_slice(filters);

        Ok(Job {
            id,
            status: job_status::CREATED.to_string(),
        })
    }

    async fn fetch_deletion_job(&self, id: &str) -> SyncResult<Option<Job>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ApiCall::FetchDeletionJob(id.to_string()));

        let status = inner.jobs.get_mut(id).and_then(next_status);

        Ok(status.map(|status| Job {
            id: id.to_string(),
            status,
        }))
    }

    async fn delete_data_pool(&self, unique_name: &str) -> SyncResult<String> {
        let mut inner = self.inner.lock().await;
        inner
            .calls
            .push(ApiCall::DeleteDataPool(unique_name.to_string()));

        let fail = inner.faults.fail_delete;
        match inner.data_pools.get_mut(unique_name) {
            Some(data_pool) if !fail => {
                data_pool.status = data_pool_status::DELETING.to_string();
                Ok(data_pool.id.clone())
            }
            _ => bail!(
                ErrorKind::TableApiFailed,
                "Data Pool deletion failed",
                format!("data pool {unique_name}")
            ),
        }
    }

    async fn delete_data_source(&self, unique_name: &str) -> SyncResult<String> {
        let mut inner = self.inner.lock().await;
        inner
            .calls
            .push(ApiCall::DeleteDataSource(unique_name.to_string()));

        let fail = inner.faults.fail_delete;
        if !fail {
            inner.connecting.remove(unique_name);
        }
        match inner.data_sources.get_mut(unique_name) {
            Some(data_source) if !fail => {
                data_source.status = data_source_status::DELETING.to_string();
                Ok(data_source.id.clone())
            }
            _ => bail!(
                ErrorKind::TableApiFailed,
                "Data Source deletion failed",
                format!("data source {unique_name}")
            ),
        }
    }
}
