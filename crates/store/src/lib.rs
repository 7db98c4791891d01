//! Tollgate - Credential Store
//!
//! Persistence for the three record families the control plane works with:
//!
//! | Record | Key | Used by |
//! |--------|-----|---------|
//! | `TenantRecord` | `tenant_id` | route reconciler |
//! | `ApiKeyRecord` | `key`, secondary `report_id` | key cache |
//! | `UsageCounter` | `(api_key_id, resource, period_start)` | metering worker |
//!
//! Consumers depend on the `CredentialStore` trait. `SqliteStore` is the
//! durable backend; `MemoryStore` serves tests and throwaway deployments.

mod error;
mod memory;
mod model;
mod sqlite;
mod store;

#[cfg(test)]
mod store_test;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use model::{ApiKeyRecord, TenantRecord, UsageCounter, UsageLimit};
pub use sqlite::SqliteStore;
pub use store::CredentialStore;
