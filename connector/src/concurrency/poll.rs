use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

/// Describes the state transition a [`poll_until_state`] call waits for.
#[derive(Debug, Clone)]
pub struct PollOptions<'a> {
    /// States in which the resource is still making progress.
    pub pending: &'a [&'a str],
    /// States that end the wait successfully.
    pub target: &'a [&'a str],
    /// Maximum time spent waiting, measured from the first probe.
    pub timeout: Duration,
    /// Pause between two consecutive probes.
    pub delay: Duration,
}

/// Repeatedly invokes `probe` until the reported state reaches one of `options.target`.
///
/// The probe returns the current resource, if any, together with its state label. Before every
/// probe the elapsed time is compared against `options.timeout`; once exceeded the wait fails
/// with [`ErrorKind::StateTransitionTimeout`]. A label that is neither pending nor a target fails
/// with [`ErrorKind::UnexpectedState`] and a probe error is returned as is. Nothing is retried
/// beyond the pending states.
pub async fn poll_until_state<T, F, Fut>(
    options: PollOptions<'_>,
    mut probe: F,
) -> SyncResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<(Option<T>, String)>>,
{
    let started_at = Instant::now();

    loop {
        if started_at.elapsed() > options.timeout {
            bail!(
                ErrorKind::StateTransitionTimeout,
                "Timed out waiting for the state transition",
                format!(
                    "expected one of {} within {:?}",
                    StateSet(options.target),
                    options.timeout
                )
            );
        }

        let (resource, state) = probe().await?;

        if options.target.contains(&state.as_str()) {
            return Ok(resource);
        }

        if !options.pending.contains(&state.as_str()) {
            bail!(
                ErrorKind::UnexpectedState,
                "Resource reached an unexpected state",
                format!("state {state}, expected one of {}", StateSet(options.target))
            );
        }

        debug!(%state, delay = ?options.delay, "resource still pending, polling again");
        tokio::time::sleep(options.delay).await;
    }
}

struct StateSet<'a>(&'a [&'a str]);

impl fmt::Display for StateSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
