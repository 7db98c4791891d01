//! Tollgate - Gateway control plane
//!
//! Wires the store, key cache, metering pipeline and route reconciler into
//! one `GatewayContext`. The `tollgate` binary runs it as a service.

pub mod context;
pub mod settings;

pub use context::{Admission, GatewayContext, open_store};
