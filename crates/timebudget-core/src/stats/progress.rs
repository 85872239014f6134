//! Budgeted vs. tracked time for one week.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::WeeklyItem;
use crate::tracking::TimeEntry;
use crate::week::WeekId;

/// Progress of a single weekly item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub budget_item_id: String,
    pub name: String,
    pub color: String,
    /// Minutes allotted for the week
    pub budgeted_min: u32,
    /// Minutes recorded against the item
    pub tracked_min: u32,
    /// Budget left, zero once exceeded
    pub remaining_min: u32,
    /// Minutes tracked beyond the budget
    pub over_min: u32,
    pub entry_count: usize,
}

impl ItemProgress {
    /// Tracked share of the budget (1.0 = exactly on budget).
    pub fn completion(&self) -> f64 {
        if self.budgeted_min == 0 {
            return if self.tracked_min > 0 { 1.0 } else { 0.0 };
        }
        self.tracked_min as f64 / self.budgeted_min as f64
    }
}

/// Summary of a week in the user's budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub week: WeekId,
    /// Whether the figures come from stored snapshot rows
    pub materialized: bool,
    pub items: Vec<ItemProgress>,
    /// Minutes tracked without a budget item, or against an item that is
    /// not part of this week
    pub unbudgeted_min: u32,
    pub total_budgeted_min: u32,
    pub total_tracked_min: u32,
}

/// Fold `entries` into per-item progress for `items`, keeping item order.
pub fn summarize(week: WeekId, items: &[WeeklyItem], entries: &[TimeEntry]) -> WeekSummary {
    let materialized = items.iter().any(WeeklyItem::is_saved);
    let mut tracked: HashMap<&str, (u32, usize)> = HashMap::new();
    let mut unbudgeted_min = 0u32;

    for entry in entries {
        let minutes = entry.minutes();
        match entry.budget_item_id.as_deref() {
            Some(id) if items.iter().any(|i| i.budget_item_id == id) => {
                let slot = tracked.entry(id).or_default();
                slot.0 = slot.0.saturating_add(minutes);
                slot.1 += 1;
            }
            _ => unbudgeted_min = unbudgeted_min.saturating_add(minutes),
        }
    }

    let items: Vec<ItemProgress> = items
        .iter()
        .map(|item| {
            let (tracked_min, entry_count) = tracked
                .get(item.budget_item_id.as_str())
                .copied()
                .unwrap_or_default();
            ItemProgress {
                budget_item_id: item.budget_item_id.clone(),
                name: item.name.clone(),
                color: item.color.clone(),
                budgeted_min: item.weekly_duration_min,
                tracked_min,
                remaining_min: item.weekly_duration_min.saturating_sub(tracked_min),
                over_min: tracked_min.saturating_sub(item.weekly_duration_min),
                entry_count,
            }
        })
        .collect();

    let total_budgeted_min = items
        .iter()
        .fold(0u32, |acc, i| acc.saturating_add(i.budgeted_min));
    let total_tracked_min = items
        .iter()
        .fold(unbudgeted_min, |acc, i| acc.saturating_add(i.tracked_min));

    WeekSummary {
        week,
        materialized,
        items,
        unbudgeted_min,
        total_budgeted_min,
        total_tracked_min,
    }
}
