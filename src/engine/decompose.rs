//! Resource decomposition: expanding task quantities into resource needs.
//!
//! A pure projection over catalog data; nothing here mutates resources
//! or norm lines.

use std::collections::BTreeMap;

use crate::models::{ResourceLine, ResourceUsage};

use super::formula::round3;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Expand one task's quantity through its norm lines.
///
/// Per line: `quantity = task_quantity * coefficient` (3 decimals),
/// `cost = quantity * unit_price` (2 decimals).
pub fn decompose(task_quantity: f64, lines: &[ResourceLine]) -> Vec<ResourceUsage> {
    lines
        .iter()
        .map(|line| {
            let quantity = round3(task_quantity * line.coefficient);
            let cost = round2(quantity * line.resource.unit_price);
            ResourceUsage {
                resource: line.resource.clone(),
                quantity,
                cost,
            }
        })
        .collect()
}

/// Fold per-task usages into grand totals per distinct resource,
/// ordered by resource code.
pub fn aggregate(usages: &[ResourceUsage]) -> Vec<ResourceUsage> {
    let mut totals: BTreeMap<String, ResourceUsage> = BTreeMap::new();

    for usage in usages {
        totals
            .entry(usage.resource.code.clone())
            .and_modify(|total| {
                total.quantity += usage.quantity;
                total.cost += usage.cost;
            })
            .or_insert_with(|| usage.clone());
    }

    totals
        .into_values()
        .map(|mut total| {
            total.quantity = round3(total.quantity);
            total.cost = round2(total.cost);
            total
        })
        .collect()
}
