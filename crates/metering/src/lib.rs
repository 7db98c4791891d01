//! Tollgate - Metering
//!
//! Two paths consume every usage report:
//!
//! - **Live quota**: `UsageMeter::report` adds the count to the key's
//!   `current` value in the shared key cache before returning, so the next
//!   quota snapshot already shows it.
//! - **Consolidation**: the event is queued without waiting and the single
//!   `ConsolidationWorker` sums events and periodically writes one counter
//!   per key, resource and calendar period.
//!
//! `bootstrap` runs once at startup to create the schema and seed the first
//! manager key into an empty store; `usage_history` reads the counters back.

mod bootstrap;
mod clock;
mod error;
mod event;
mod history;
mod meter;
mod period;
mod pointer;
mod worker;

pub use bootstrap::{BootstrapSettings, bootstrap};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MeteringError, Result};
pub use event::{UsageEvent, UsageQueue};
pub use history::{HistoryQuery, UsageRecord, usage_history};
pub use meter::UsageMeter;
pub use period::Period;
pub use pointer::PointerCache;
pub use worker::{ConsolidationWorker, FlushStats, MeteringSettings};
