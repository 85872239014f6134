//! Authoritative budget plans and their items.
//!
//! A plan is a named set of weekly time allocations owned by one user. Its
//! items are the source of truth for the live-copy fields of weekly
//! snapshots.

mod service;

pub use service::PlanService;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// A budget plan with its items ordered by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

impl Plan {
    pub fn item(&self, item_id: &str) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.id == item_id)
    }
}

/// A recurring weekly allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    pub plan_id: String,
    pub name: String,
    pub weekly_duration_min: u32,
    pub weekly_occurrences: u32,
    pub icon: String,
    pub color: String,
    pub position: i64,
}

/// Fields for a new plan item. The position is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlanItem {
    pub name: String,
    pub weekly_duration_min: u32,
    #[serde(default = "default_occurrences")]
    pub weekly_occurrences: u32,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

fn default_occurrences() -> u32 {
    1
}

impl NewPlanItem {
    pub fn new(name: impl Into<String>, weekly_duration_min: u32) -> Self {
        Self {
            name: name.into(),
            weekly_duration_min,
            weekly_occurrences: default_occurrences(),
            icon: String::new(),
            color: String::new(),
        }
    }

    pub fn with_occurrences(mut self, weekly_occurrences: u32) -> Self {
        self.weekly_occurrences = weekly_occurrences;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Partial edit of a plan item; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItemChanges {
    pub name: Option<String>,
    pub weekly_duration_min: Option<u32>,
    pub weekly_occurrences: Option<u32>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl PlanItemChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.weekly_duration_min.is_none()
            && self.weekly_occurrences.is_none()
            && self.icon.is_none()
            && self.color.is_none()
    }

    pub(crate) fn apply(self, item: &mut PlanItem) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(duration) = self.weekly_duration_min {
            item.weekly_duration_min = duration;
        }
        if let Some(occurrences) = self.weekly_occurrences {
            item.weekly_occurrences = occurrences;
        }
        if let Some(icon) = self.icon {
            item.icon = icon;
        }
        if let Some(color) = self.color {
            item.color = color;
        }
    }
}

/// Read access to authoritative plan data.
pub trait PlanReader {
    /// The plan flagged current for `user_id`, with items.
    ///
    /// # Errors
    /// [`CoreError::NoCurrentPlan`](crate::CoreError::NoCurrentPlan) if none.
    fn current_plan(&self, user_id: &str) -> Result<Plan>;

    /// A plan by identity, with items.
    ///
    /// # Errors
    /// [`CoreError::PlanNotFound`](crate::CoreError::PlanNotFound) if missing.
    fn plan(&self, plan_id: &str) -> Result<Plan>;

    /// An item by identity.
    ///
    /// # Errors
    /// [`CoreError::AuthoritativeItemNotFound`](crate::CoreError::AuthoritativeItemNotFound)
    /// if missing.
    fn item(&self, item_id: &str) -> Result<PlanItem>;
}

pub(crate) fn validate_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Minutes in a week; no allocation can exceed it.
pub const MAX_WEEKLY_MINUTES: u32 = 7 * 24 * 60;

pub(crate) fn validate_duration(minutes: u32) -> Result<(), ValidationError> {
    if minutes > MAX_WEEKLY_MINUTES {
        return Err(ValidationError::InvalidValue {
            field: "weekly_duration_min".to_string(),
            message: format!("{minutes} exceeds the {MAX_WEEKLY_MINUTES} minutes in a week"),
        });
    }
    Ok(())
}
