//! The acting user of an operation.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::week::WeekId;

/// Identity and week-start preference of the user an operation acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub week_start: Weekday,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, week_start: Weekday) -> Self {
        Self {
            user_id: user_id.into(),
            week_start,
        }
    }

    /// The user's week containing `at`.
    pub fn week_of(&self, at: DateTime<Utc>) -> WeekId {
        WeekId::from_datetime(at, self.week_start)
    }
}
