//! Tollgate - Authentication
//!
//! API key resolution, authorization context and live quota tracking for
//! the gateway's request path.
//!
//! # Outcomes
//!
//! | Request presents | Outcome |
//! |------------------|---------|
//! | no credential | `AuthOutcome::NoCredential` (pass-through) |
//! | unknown key or report id | `AuthOutcome::Rejected(UnknownCredential)` |
//! | disabled key | `AuthOutcome::Rejected(Disabled)` |
//! | enabled key | `AuthOutcome::Authenticated(AuthContext)` |
//!
//! Store failures are `Err(AuthError)`, never an outcome.
//!
//! # Example
//!
//! ```ignore
//! let cache = ApiKeyCache::new(store);
//! match cache.authenticate(request.headers()).await? {
//!     AuthOutcome::Authenticated(ctx) if Policy::OnlyThirdParties.allows(&ctx) => {
//!         ctx.rewrite_headers(request.headers_mut(), &reporting_base_url)?;
//!     }
//!     AuthOutcome::NoCredential => {}
//!     _ => return unauthorized(),
//! }
//! ```

mod cache;
mod context;
mod credential;
mod error;
mod janitor;
mod roles;

pub use cache::{ApiKeyCache, AuthOutcome, DEFAULT_PURGE_BATCH_SIZE, RejectReason};
pub use context::{
    AuthContext, DEPARTMENT_HEADER, LIMITS_HEADER, QuotaEntry, QuotaSnapshot, REPORTING_HEADER,
    TENANT_HEADER,
};
pub use credential::{API_KEY_HEADER, AUTHORIZATION_HEADER, PresentedCredential, extract_credential};
pub use error::{AuthError, Result};
pub use janitor::CacheJanitor;
pub use roles::{Policy, Role};
