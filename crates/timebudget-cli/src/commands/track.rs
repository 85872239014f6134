//! Time tracking commands for CLI.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use timebudget_core::{NewTimeEntry, WeekId};

use super::{open_app, print_json, week_or_current, CmdResult};

#[derive(Subcommand)]
pub enum TrackAction {
    /// Record an interval
    Add {
        /// Start as RFC 3339 (e.g. 2026-02-10T08:00:00Z)
        #[arg(long)]
        start: DateTime<Utc>,
        /// End as RFC 3339
        #[arg(long)]
        end: DateTime<Utc>,
        /// Budget item the time counts against
        #[arg(long)]
        item: Option<String>,
        #[arg(long, default_value = "")]
        summary: String,
    },
    /// List intervals starting in a week
    List {
        /// Week as YYYY-Www (default: current week)
        #[arg(long)]
        week: Option<WeekId>,
    },
    /// Delete an interval
    Delete {
        /// Entry UID
        uid: String,
    },
}

pub fn run(action: TrackAction) -> CmdResult {
    let app = open_app()?;
    let user = app.user();
    let tracking = app.tracking();

    match action {
        TrackAction::Add {
            start,
            end,
            item,
            summary,
        } => {
            let mut entry = NewTimeEntry::new(start, end).with_summary(summary);
            entry.budget_item_id = item;
            print_json(&tracking.record(&user, entry)?)?;
        }
        TrackAction::List { week } => {
            let week = week_or_current(week, &user);
            print_json(&tracking.entries_for_week(&user, week)?)?;
        }
        TrackAction::Delete { uid } => {
            if !tracking.delete(&user, &uid)? {
                return Err(format!("time entry {uid} not found").into());
            }
            println!("deleted entry {uid}");
        }
    }
    Ok(())
}
