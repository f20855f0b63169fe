//! Suggested repair estimate for a resolution

use crate::types::{CostEstimate, ResolutionNode};

/// Round to 2 decimal places
#[inline]
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parts + labor + GST over the subtotal
#[must_use]
pub fn estimate_for(resolution: &ResolutionNode, gst_rate: f64) -> CostEstimate {
    let parts_total = round2(
        resolution
            .parts_required
            .iter()
            .map(|p| p.price * f64::from(p.quantity))
            .sum(),
    );
    let labor_total = round2(resolution.labor_hours * resolution.labor_rate);
    let subtotal = round2(parts_total + labor_total);
    let gst_amount = round2(subtotal * gst_rate);

    CostEstimate {
        resolution_id: resolution.resolution_id.clone(),
        parts_total,
        labor_total,
        subtotal,
        gst_rate,
        gst_amount,
        grand_total: round2(subtotal + gst_amount),
    }
}
