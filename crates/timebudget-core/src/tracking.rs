//! Time-tracking intervals.
//!
//! Recording an interval publishes [`CALENDAR_EVENT_CREATED`], which lets
//! the snapshot service materialize the interval's week.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::bus::{DispatchContext, EventBus};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{CalendarEventCreated, CALENDAR_EVENT_CREATED};
use crate::plan::PlanReader;
use crate::storage::{Database, PlanDb, TimeEntryDb};
use crate::user::UserContext;
use crate::week::WeekId;

/// A recorded interval of activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub uid: String,
    pub user_id: String,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub budget_item_id: Option<String>,
}

impl TimeEntry {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Whole minutes tracked, rounded down.
    pub fn minutes(&self) -> u32 {
        u32::try_from(self.duration().num_minutes()).unwrap_or(0)
    }
}

/// Input for [`TrackingService::record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimeEntry {
    #[serde(default)]
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub budget_item_id: Option<String>,
}

impl NewTimeEntry {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            summary: String::new(),
            start_time,
            end_time,
            budget_item_id: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn for_item(mut self, budget_item_id: impl Into<String>) -> Self {
        self.budget_item_id = Some(budget_item_id.into());
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.end_time <= self.start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }
}

/// Records and lists time entries.
pub struct TrackingService {
    db: Arc<Database>,
    bus: Arc<EventBus>,
    dispatch_timeout: Option<Duration>,
}

impl TrackingService {
    pub fn new(db: Arc<Database>, bus: Arc<EventBus>, dispatch_timeout: Option<Duration>) -> Self {
        Self {
            db,
            bus,
            dispatch_timeout,
        }
    }

    /// Persist an interval and announce it on the bus.
    ///
    /// # Errors
    /// `Validation` for an empty or inverted range,
    /// `AuthoritativeItemNotFound` when the referenced item does not belong
    /// to one of the user's plans, `Publish` when a subscriber failed after
    /// the entry was stored.
    pub fn record(&self, user: &UserContext, entry: NewTimeEntry) -> Result<TimeEntry> {
        entry.validate()?;

        let stored = self.db.transaction(|tx| {
            if let Some(item_id) = entry.budget_item_id.as_deref() {
                let plans = PlanDb::new(tx);
                let item = plans.item(item_id)?;
                if plans.plan(&item.plan_id)?.user_id != user.user_id {
                    return Err(CoreError::AuthoritativeItemNotFound {
                        item_id: item_id.to_string(),
                    });
                }
            }
            let stored = TimeEntry {
                uid: Uuid::new_v4().to_string(),
                user_id: user.user_id.clone(),
                summary: entry.summary,
                start_time: entry.start_time,
                end_time: entry.end_time,
                budget_item_id: entry.budget_item_id,
            };
            TimeEntryDb::new(tx).insert(&stored)?;
            Ok(stored)
        })?;
        info!(user = %user.user_id, uid = %stored.uid, minutes = stored.minutes(), "recorded time entry");

        let ctx = DispatchContext::for_actor(user.clone(), self.dispatch_timeout);
        self.bus.publish_payload(
            CALENDAR_EVENT_CREATED,
            CalendarEventCreated::from(&stored),
            ctx,
        )?;
        Ok(stored)
    }

    /// Entries whose start lies in `week`, oldest first.
    pub fn entries_for_week(&self, user: &UserContext, week: WeekId) -> Result<Vec<TimeEntry>> {
        let (start, end) = week.utc_range(user.week_start);
        self.db
            .read(|conn| TimeEntryDb::new(conn).for_range(&user.user_id, start, end))
    }

    /// Remove an entry. Returns `false` if the user has no entry `uid`.
    pub fn delete(&self, user: &UserContext, uid: &str) -> Result<bool> {
        let removed = self
            .db
            .transaction(|tx| TimeEntryDb::new(tx).delete(&user.user_id, uid))?;
        Ok(removed > 0)
    }
}
