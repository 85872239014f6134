use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::PlanItem;
use crate::tracking::TimeEntry;

/// Published after an authoritative plan item was edited or moved.
pub const BUDGET_ITEM_UPDATED: &str = "budget_plan.item.updated";

/// Published after a time-tracking interval was recorded.
pub const CALENDAR_EVENT_CREATED: &str = "calendar.event.created";

/// Full current field set of an edited plan item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetItemUpdated {
    pub id: String,
    pub plan_id: String,
    pub name: String,
    #[serde(rename = "weeklyDuration")]
    pub weekly_duration_min: u32,
    pub weekly_occurrences: u32,
    pub icon: String,
    pub color: String,
    pub position: i64,
}

impl From<&PlanItem> for BudgetItemUpdated {
    fn from(item: &PlanItem) -> Self {
        Self {
            id: item.id.clone(),
            plan_id: item.plan_id.clone(),
            name: item.name.clone(),
            weekly_duration_min: item.weekly_duration_min,
            weekly_occurrences: item.weekly_occurrences,
            icon: item.icon.clone(),
            color: item.color.clone(),
            position: item.position,
        }
    }
}

/// A recorded time-tracking interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventCreated {
    pub uid: String,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub budget_item_id: Option<String>,
}

impl From<&TimeEntry> for CalendarEventCreated {
    fn from(entry: &TimeEntry) -> Self {
        Self {
            uid: entry.uid.clone(),
            summary: entry.summary.clone(),
            start_time: entry.start_time,
            end_time: entry.end_time,
            budget_item_id: entry.budget_item_id.clone(),
        }
    }
}
