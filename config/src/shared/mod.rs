//! Shared configuration types for the destination connector.

mod api;
mod base;
mod batch;
mod destination;
mod polling;

pub use api::ApiConfig;
pub use base::ValidationError;
pub use batch::BatchConfig;
pub use destination::DestinationConfig;
pub use polling::PollingConfig;
