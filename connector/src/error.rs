//! Error types and result definitions for sync operations.
//!
//! Every fallible operation of the connector returns a [`SyncError`], which carries a
//! classification ([`ErrorKind`]), a static description, optional dynamic detail naming the
//! resource involved, the originating error and the callsite location.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for sync operations using [`SyncError`] as the error type.
pub type SyncResult<T> = Result<T, SyncError>;

/// Specific categories of errors that can occur during a sync.
///
/// Kinds are grouped by the failure class they belong to. Configuration and upstream errors abort
/// the sync; per-record delivery rejections never surface as a [`SyncError`] at all.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,
    InvalidCatalog,
    MissingPrimaryKey,
    InvalidPrimaryKey,
    SyncModeMismatch,
    UnsupportedType,
    MissingTable,

    // Upstream Dependency Errors
    AuthenticationError,
    TableApiFailed,
    DeletionJobFailed,
    StateTransitionTimeout,
    UnexpectedState,

    // Delivery Errors
    DeliveryFailed,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,
}

/// Main error type for sync operations.
#[derive(Debug, Clone)]
pub struct SyncError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`SyncError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[{:?}] {}", self.kind, self.description)?;

        if let Some(detail) = self.detail.as_deref() {
            write!(f, ": {detail}")?;
        }

        if let Some(source) = self.source.as_ref() {
            write!(f, " (caused by: {source})")?;
        }

        Ok(())
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`SyncError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`SyncError`] with the appropriate error kind.
///
/// Maps to [`ErrorKind::IoError`] for I/O failures and [`ErrorKind::DeserializationError`] for
/// syntax, data and EOF failures. Callers serializing a value map their error to
/// [`ErrorKind::SerializationError`] themselves.
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
