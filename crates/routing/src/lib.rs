//! Tollgate - Routing
//!
//! Turns the tenant list into the routing table served by the proxy engine.
//!
//! # Design
//!
//! The `TenantRouteReconciler` polls the credential store, reduces the
//! tenants to a canonical form and hashes it. Only when the hash moves is
//! a new table built and handed to the `RoutingTablePublisher`, which swaps
//! it in atomically for every `RoutingTableSubscriber`.
//!
//! Entries that fail validation are dropped one by one; a bad tenant never
//! blocks the rest of the table.
//!
//! # Example
//!
//! ```
//! use tollgate_routing::{ReconcilerSettings, build_table, canonicalize};
//! use tollgate_store::TenantRecord;
//!
//! let settings = ReconcilerSettings::default();
//! let tenants = vec![TenantRecord::new("acme", "Acme").with_entry_point("/ocr", "ocr")];
//! let canonical = canonicalize(&tenants, &settings.default_entry_points);
//!
//! let (table, dropped) = build_table(&canonical, &settings);
//! assert_eq!(dropped, 0);
//! assert_eq!(table.match_route("GET", "/acme/ocr/scan").unwrap().route_id, "acme-1");
//! ```

mod entry;
mod error;
mod fingerprint;
mod publisher;
mod reconciler;
mod table;


pub use entry::{CATCH_ALL, ClusterEntry, ROUTE_METHODS, RouteEntry};
pub use error::{Result, RoutingError};
pub use fingerprint::{CanonicalTenant, Fingerprint, canonicalize};
pub use publisher::{RoutingTablePublisher, RoutingTableSubscriber};
pub use reconciler::{ReconcilerSettings, TenantRouteReconciler, TickOutcome, build_table};
pub use table::{RoutingTable, RoutingTableBuilder};
