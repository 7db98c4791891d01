//! Roles and route authorization policies
//!
//! Roles are stored as free-form tags on API keys. Four are recognized:
//!
//! - `Manager` - administers tenants and keys, may act for any tenant
//! - `Trainer` - uploads training material
//! - `ThirdParty` - regular tenant traffic through the gateway
//! - `Metrics` - reads usage history
//!
//! Routes reference a `Policy` by name; a policy names the role it requires.

use std::fmt;

use crate::context::AuthContext;

/// Known role tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Tenant and key administration
    Manager,
    /// Training uploads
    Trainer,
    /// Tenant traffic
    ThirdParty,
    /// Usage history access
    Metrics,
}

impl Role {
    /// Parse a role tag, ignoring ASCII case
    pub fn parse(s: &str) -> Option<Self> {
        [Self::Manager, Self::Trainer, Self::ThirdParty, Self::Metrics]
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
    }

    /// Tag as stored on key records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::Trainer => "Trainer",
            Self::ThirdParty => "ThirdParty",
            Self::Metrics => "Metrics",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named authorization policy attached to generated routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Requires `ThirdParty`
    OnlyThirdParties,
    /// Requires `Trainer`
    OnlyTrainers,
}

impl Policy {
    /// Parse a policy name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OnlyThirdParties" => Some(Self::OnlyThirdParties),
            "OnlyTrainers" => Some(Self::OnlyTrainers),
            _ => None,
        }
    }

    /// Policy name as referenced by routes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnlyThirdParties => "OnlyThirdParties",
            Self::OnlyTrainers => "OnlyTrainers",
        }
    }

    /// Role a caller must hold
    pub fn required_role(&self) -> Role {
        match self {
            Self::OnlyThirdParties => Role::ThirdParty,
            Self::OnlyTrainers => Role::Trainer,
        }
    }

    /// Whether an authenticated caller satisfies the policy
    pub fn allows(&self, context: &AuthContext) -> bool {
        context.has_role(self.required_role())
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
