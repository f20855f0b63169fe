//! Diagnostic context for ranking

use crate::error::RankingError;
use efi_knowledge::normalize::{normalize_dtc_codes, normalize_optional, normalize_terms};
use serde::{Deserialize, Serialize};

/// Vehicle / symptom context a technician is diagnosing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticContext {
    /// Calling tenant (required)
    pub organization_id: String,
    /// Vehicle make, e.g. `Ola`
    pub vehicle_make: Option<String>,
    /// Vehicle model, e.g. `S1 Pro`
    pub vehicle_model: Option<String>,
    /// Hard filter on candidate cards
    pub subsystem: Option<String>,
    /// Reported symptoms
    pub symptoms: Vec<String>,
    /// Reported DTC codes
    pub dtc_codes: Vec<String>,
}

impl DiagnosticContext {
    /// Create context for a tenant
    #[inline]
    #[must_use]
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Self::default()
        }
    }

    /// Set vehicle make and model
    #[inline]
    #[must_use]
    pub fn with_vehicle(mut self, make: impl Into<String>, model: impl Into<String>) -> Self {
        self.vehicle_make = Some(make.into());
        self.vehicle_model = Some(model.into());
        self
    }

    /// Set vehicle make only
    #[inline]
    #[must_use]
    pub fn with_make(mut self, make: impl Into<String>) -> Self {
        self.vehicle_make = Some(make.into());
        self
    }

    /// Set subsystem filter
    #[inline]
    #[must_use]
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Set symptoms
    #[must_use]
    pub fn with_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symptoms = symptoms.into_iter().map(Into::into).collect();
        self
    }

    /// Set DTC codes
    #[must_use]
    pub fn with_dtc_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dtc_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and normalize for scoring
    ///
    /// # Errors
    /// `RankingError::Validation` for a blank organization or malformed DTC
    pub fn normalize(&self) -> Result<NormalizedContext, RankingError> {
        let organization_id = self.organization_id.trim();
        if organization_id.is_empty() {
            return Err(RankingError::Validation("organization_id is required".into()));
        }
        Ok(NormalizedContext {
            organization_id: organization_id.to_string(),
            vehicle_make: normalize_optional(self.vehicle_make.as_deref()),
            vehicle_model: normalize_optional(self.vehicle_model.as_deref()),
            subsystem: normalize_optional(self.subsystem.as_deref()),
            symptoms: normalize_terms(&self.symptoms),
            dtc_codes: normalize_dtc_codes(&self.dtc_codes)?,
        })
    }
}

/// Context with lowercase terms and canonical DTC codes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedContext {
    /// Calling tenant
    pub organization_id: String,
    /// Lowercased make
    pub vehicle_make: Option<String>,
    /// Lowercased model
    pub vehicle_model: Option<String>,
    /// Lowercased subsystem
    pub subsystem: Option<String>,
    /// Lowercased symptoms
    pub symptoms: Vec<String>,
    /// Canonical DTC codes
    pub dtc_codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_organization_is_rejected() {
        let err = DiagnosticContext::new("  ").normalize().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn malformed_dtc_is_a_validation_error() {
        let err = DiagnosticContext::new("org-1")
            .with_dtc_codes(["not-a-code"])
            .normalize()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn terms_are_normalized() {
        let ctx = DiagnosticContext::new("org-1")
            .with_vehicle("Ola", " S1  Pro ")
            .with_subsystem("Battery")
            .with_symptoms(["Range Drop"])
            .with_dtc_codes(["p0a80"])
            .normalize()
            .unwrap();
        assert_eq!(ctx.vehicle_model.as_deref(), Some("s1 pro"));
        assert_eq!(ctx.subsystem.as_deref(), Some("battery"));
        assert_eq!(ctx.symptoms, vec!["range drop"]);
        assert_eq!(ctx.dtc_codes, vec!["P0A80"]);
    }
}
