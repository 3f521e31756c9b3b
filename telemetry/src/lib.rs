//! Tracing setup shared by the connector binary and its tests.
//!
//! Stdout belongs to the Airbyte protocol, so every diagnostic emitted through `tracing` goes to
//! stderr where the platform collects it as plain log output.

use std::io;
use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that turns on tracing output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for an application.
///
/// The filter is read from `RUST_LOG` and defaults to `info` for the application crates.
/// Returns an error if a global subscriber was already installed.
pub fn init_tracing(app_name: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_filter = format!("{app_name}=info,connector=info,warn");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .try_init()
}

/// Installs a tracing subscriber for tests, once per process.
///
/// Output is only produced when `ENABLE_TRACING` is set, which keeps test logs quiet unless a
/// failure is being investigated.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
