use airbyte::{LogLevel, Logger};
use chrono::{SecondsFormat, Utc};
use config::shared::PollingConfig;
use tracing::info;

use crate::bail;
use crate::clients::ApiClient;
use crate::concurrency::poll::{PollOptions, poll_until_state};
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::types::{
    EXTRACTED_AT_COLUMN, FilterInput, FilterOperator, data_pool_status, data_source_status,
    job_status,
};

const JOB_PENDING: &[&str] = &[job_status::CREATED, job_status::IN_PROGRESS];
const JOB_FINISHED: &[&str] = &[job_status::SUCCEEDED, job_status::FAILED];

/// Deletes every row of the Data Pool backing `unique_name` extracted up to now.
///
/// Used before an overwrite sync writes into an existing table. The call blocks until the
/// deletion job finishes; a failed job is fatal.
pub async fn purge_extracted_rows<A, L>(
    api: &A,
    logger: &L,
    polling: &PollingConfig,
    unique_name: &str,
) -> SyncResult<()>
where
    A: ApiClient,
    L: Logger,
{
    let Some(data_pool) = api.fetch_data_pool(unique_name).await? else {
        bail!(
            ErrorKind::TableApiFailed,
            "Data Pool backing the Data Source was not found",
            format!("data pool {unique_name}")
        );
    };

    let filter = FilterInput {
        column: EXTRACTED_AT_COLUMN.to_string(),
        operator: FilterOperator::LessThanOrEqualTo,
        value: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
    };
    let job = api.create_deletion_job(&data_pool.id, &[filter]).await?;
    let job_id = job.id.as_str();

    info!(data_pool_id = %data_pool.id, job_id, "waiting for deletion job");

    let finished = poll_until_state(
        PollOptions {
            pending: JOB_PENDING,
            target: JOB_FINISHED,
            timeout: polling.deletion_timeout(),
            delay: polling.delay(),
        },
        move || async move {
            let Some(job) = api.fetch_deletion_job(job_id).await? else {
                bail!(
                    ErrorKind::TableApiFailed,
                    "Deletion Job was not found",
                    format!("job {job_id}")
                );
            };

            let status = job.status.clone();
            Ok((Some(job), status))
        },
    )
    .await
    .map_err(|err| {
        sync_error!(
            err.kind(),
            "Deletion Job did not complete",
            format!("job {job_id} of data pool {}", data_pool.id),
            source: err
        )
    })?;

    if finished.is_some_and(|job| job.status == job_status::FAILED) {
        bail!(
            ErrorKind::DeletionJobFailed,
            "Deletion Job failed",
            format!("job {job_id} of data pool {}", data_pool.id)
        );
    }

    logger.log(
        LogLevel::Info,
        format!(
            "Deletion Job {job_id} succeeded for Data Pool {}",
            data_pool.id
        ),
    );

    Ok(())
}

/// Deletes the Data Pools and Data Sources named `unique_names`.
///
/// Every Data Pool deletion is requested before any of them is awaited, then the same is done for
/// the Data Sources, so the tables are torn down side by side rather than one after the other. A
/// resource that can no longer be found counts as deleted.
pub async fn delete_tables<'a, A, I>(
    api: &A,
    polling: &PollingConfig,
    unique_names: I,
) -> SyncResult<()>
where
    A: ApiClient,
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let unique_names = unique_names.into_iter();
    let options = PollOptions {
        pending: &[data_pool_status::DELETING],
        target: &[data_pool_status::DELETED],
        timeout: polling.deletion_timeout(),
        delay: polling.delay(),
    };

    for unique_name in unique_names.clone() {
        api.delete_data_pool(unique_name).await?;
    }

    for unique_name in unique_names.clone() {
        poll_until_state(options.clone(), move || async move {
            let state = match api.fetch_data_pool(unique_name).await? {
                Some(data_pool) => data_pool.status,
                None => data_pool_status::DELETED.to_string(),
            };

            Ok((Some(()), state))
        })
        .await
        .map_err(|err| {
            sync_error!(
                err.kind(),
                "Data Pool was not deleted",
                format!("data pool {unique_name}"),
                source: err
            )
        })?;

        info!(data_pool = %unique_name, "data pool deleted");
    }

    for unique_name in unique_names.clone() {
        api.delete_data_source(unique_name).await?;
    }

    let options = PollOptions {
        pending: &[data_source_status::DELETING],
        target: &[data_source_status::DELETED],
        ..options
    };

    for unique_name in unique_names {
        poll_until_state(options.clone(), move || async move {
            let state = match api.fetch_data_source(unique_name).await? {
                Some(data_source) => data_source.status,
                None => data_source_status::DELETED.to_string(),
            };

            Ok((Some(()), state))
        })
        .await
        .map_err(|err| {
            sync_error!(
                err.kind(),
                "Data Source was not deleted",
                format!("data source {unique_name}"),
                source: err
            )
        })?;

        info!(data_source = %unique_name, "data source deleted");
    }

    Ok(())
}
