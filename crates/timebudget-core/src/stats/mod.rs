//! Weekly statistics.
//!
//! Compares the week's budget (snapshot rows, or the current plan for an
//! unmaterialized week) with the time entries recorded in it.

mod progress;

pub use progress::{summarize, ItemProgress, WeekSummary};

use std::sync::Arc;

use crate::error::Result;
use crate::snapshot::WeeklySnapshotService;
use crate::tracking::TrackingService;
use crate::user::UserContext;
use crate::week::WeekId;

/// Read-only view joining snapshots and time entries.
pub struct StatsService {
    snapshots: Arc<WeeklySnapshotService>,
    tracking: Arc<TrackingService>,
}

impl StatsService {
    pub fn new(snapshots: Arc<WeeklySnapshotService>, tracking: Arc<TrackingService>) -> Self {
        Self {
            snapshots,
            tracking,
        }
    }

    pub fn week_summary(&self, user: &UserContext, week: WeekId) -> Result<WeekSummary> {
        let items = self.snapshots.items_for_week(user, week)?;
        let entries = self.tracking.entries_for_week(user, week)?;
        Ok(summarize(week, &items, &entries))
    }
}
