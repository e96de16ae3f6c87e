//! Video persistence for vlens.
//!
//! Completed analyses go to a primary REST store when it is reachable and to
//! a local filesystem store otherwise. The [`PersistenceGateway`] hides the
//! choice from callers and keeps a local backup of primary writes.

pub mod error;
pub mod gateway;
pub mod local;
pub mod metrics;
pub mod primary;
pub mod retry;
pub mod store;

#[cfg(test)]
mod primary_tests;

pub use error::{StorageError, StorageResult};
pub use gateway::{
    DeleteReport, GatewayConfig, PersistenceGateway, SaveReceipt, StoreHealth, StoreLocation,
};
pub use local::{LocalStoreConfig, LocalVideoStore};
pub use primary::{HttpVideoStore, PrimaryStoreConfig};
pub use retry::{with_retry, RetryConfig};
pub use store::{OriginalFile, VideoStore};
