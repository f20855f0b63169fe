//! Recurring-failure grouping
//!
//! Events group by `(organization, vehicle model, subsystem)`. Model and
//! subsystem compare case- and whitespace-insensitively.

use crate::types::{LearningEvent, ModelRiskAlert};
use chrono::{DateTime, Duration, Utc};
use efi_knowledge::normalize::normalize_term;

/// Grouping key for pattern detection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    /// Tenant
    pub organization_id: String,
    /// Normalized vehicle model
    pub vehicle_model: String,
    /// Normalized subsystem
    pub subsystem: String,
}

impl PatternKey {
    /// Key for an event; `None` without a vehicle model
    #[must_use]
    pub fn for_event(event: &LearningEvent) -> Option<Self> {
        let model = normalize_term(event.vehicle_model.as_deref()?);
        let subsystem = normalize_term(&event.subsystem);
        if model.is_empty() || subsystem.is_empty() {
            return None;
        }
        Some(Self {
            organization_id: event.organization_id.clone(),
            vehicle_model: model,
            subsystem,
        })
    }

    /// Check if an event belongs to this group
    #[must_use]
    pub fn matches_event(&self, event: &LearningEvent) -> bool {
        event.organization_id == self.organization_id
            && event
                .vehicle_model
                .as_deref()
                .is_some_and(|m| normalize_term(m) == self.vehicle_model)
            && normalize_term(&event.subsystem) == self.subsystem
    }

    /// Check if an alert tracks this group
    #[must_use]
    pub fn matches_alert(&self, alert: &ModelRiskAlert) -> bool {
        alert.organization_id == self.organization_id
            && normalize_term(&alert.vehicle_model) == self.vehicle_model
            && normalize_term(&alert.subsystem) == self.subsystem
    }
}

/// Trailing window ending at `reference`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Inclusive end
    pub end: DateTime<Utc>,
}

impl Window {
    /// Window of `days` ending at `reference`. A span beyond chrono's range
    /// starts at the earliest representable instant.
    #[must_use]
    pub fn trailing(reference: DateTime<Utc>, days: i64) -> Self {
        let start = Duration::try_days(days)
            .and_then(|span| reference.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            start,
            end: reference,
        }
    }

    /// Check if a timestamp falls in the window
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Distinct ticket ids in first-seen order
#[must_use]
pub fn distinct_tickets<'a>(events: impl IntoIterator<Item = &'a LearningEvent>) -> Vec<String> {
    let mut tickets: Vec<String> = Vec::new();
    for event in events {
        if !tickets.contains(&event.ticket_id) {
            tickets.push(event.ticket_id.clone());
        }
    }
    tickets
}
