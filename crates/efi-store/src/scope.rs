//! Tenant / global scoping
//!
//! Knowledge is either shared platform-wide (`Global`) or private to one
//! organization (`Tenant`). The enum makes `scope=global ⇒ organization_id=null`
//! unrepresentable as anything else; serialized it flattens to the
//! `scope` + `organization_id` document fields.

use serde::{Deserialize, Serialize};

/// Visibility scope of a knowledge document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Shared across every tenant
    Global,
    /// Private to one organization
    Tenant {
        /// Owning organization
        organization_id: String,
    },
}

impl Scope {
    /// Derive scope from an optional organization id.
    ///
    /// A missing or blank organization id yields `Global`.
    #[must_use]
    pub fn from_organization(organization_id: Option<&str>) -> Self {
        match organization_id.map(str::trim) {
            Some(org) if !org.is_empty() => Self::Tenant {
                organization_id: org.to_string(),
            },
            _ => Self::Global,
        }
    }

    /// Tenant scope for an organization
    #[inline]
    #[must_use]
    pub fn tenant(organization_id: impl Into<String>) -> Self {
        Self::Tenant {
            organization_id: organization_id.into(),
        }
    }

    /// Owning organization, `None` for global documents
    #[inline]
    #[must_use]
    pub fn organization_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Tenant { organization_id } => Some(organization_id),
        }
    }

    /// Check if this is global scope
    #[inline]
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Short label used in citations and logs
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Tenant { .. } => "tenant",
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::Global
    }
}

/// Read rule for a caller: `{global} ∪ {tenant ∧ organization_id = caller}`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Visibility {
    organization_id: Option<String>,
}

impl Visibility {
    /// Visibility for a tenant caller
    #[inline]
    #[must_use]
    pub fn for_tenant(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
        }
    }

    /// Visibility for a caller with no tenant (global documents only)
    #[inline]
    #[must_use]
    pub fn global_only() -> Self {
        Self::default()
    }

    /// Visibility for an optional caller organization
    #[must_use]
    pub fn for_caller(organization_id: Option<&str>) -> Self {
        match organization_id.map(str::trim) {
            Some(org) if !org.is_empty() => Self::for_tenant(org),
            _ => Self::global_only(),
        }
    }

    /// Caller organization, if any
    #[inline]
    #[must_use]
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// Check whether a document with this scope is visible
    #[must_use]
    pub fn permits(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Global => true,
            Scope::Tenant { organization_id } => {
                self.organization_id.as_deref() == Some(organization_id.as_str())
            }
        }
    }
}
