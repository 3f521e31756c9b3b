//! Lifecycle of the Data Sources a sync writes to.
//!
//! [`reconciler`] makes every configured stream's Data Source match its sync mode before any
//! record is read. [`deletion`] holds the destructive operations: purging the rows of an
//! overwritten table and tearing every table down after a full reset.

mod credentials;
pub mod deletion;
pub mod reconciler;

pub use reconciler::{ReconciledTables, TableReconciler};
