//! Weekly snapshots of a budget plan.
//!
//! A week is *unmaterialized* until the first edit (or recorded activity)
//! touches it; until then reads pass the current plan straight through.
//! Materializing stores one [`WeeklyItem`] per plan item, and from then on
//! each field follows its own rule:
//!
//! | field                         | rule                                   |
//! |-------------------------------|----------------------------------------|
//! | name, icon, color, position   | live copy, updated by propagation      |
//! | weekly duration, notes        | user override, reset on request        |
//! | weekly occurrences            | frozen at materialization              |

mod service;

pub use service::WeeklySnapshotService;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::plan::{validate_duration, PlanItem};
use crate::week::WeekId;

/// A plan item as seen in one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyItem {
    /// Snapshot row identity; `None` for pass-through items of an
    /// unmaterialized week.
    pub id: Option<String>,
    pub user_id: String,
    pub week: WeekId,
    pub plan_id: String,
    pub budget_item_id: String,
    pub name: String,
    pub weekly_duration_min: u32,
    pub weekly_occurrences: u32,
    pub icon: String,
    pub color: String,
    pub position: i64,
    pub notes: String,
}

impl WeeklyItem {
    /// Unsaved view of `item` for an unmaterialized week.
    pub fn pass_through(user_id: &str, week: WeekId, item: &PlanItem) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            week,
            plan_id: item.plan_id.clone(),
            budget_item_id: item.id.clone(),
            name: item.name.clone(),
            weekly_duration_min: item.weekly_duration_min,
            weekly_occurrences: item.weekly_occurrences,
            icon: item.icon.clone(),
            color: item.color.clone(),
            position: item.position,
            notes: String::new(),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
}

/// The user-editable part of a weekly item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyItemUpdate {
    pub weekly_duration_min: u32,
    #[serde(default)]
    pub notes: String,
}

impl WeeklyItemUpdate {
    pub fn new(weekly_duration_min: u32, notes: impl Into<String>) -> Self {
        Self {
            weekly_duration_min,
            notes: notes.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        validate_duration(self.weekly_duration_min)
    }
}
