//! Weekly budget commands for CLI.

use clap::Subcommand;
use timebudget_core::{WeekId, WeeklyItemUpdate};

use super::{open_app, print_json, week_or_current, CmdResult};

#[derive(Subcommand)]
pub enum WeekAction {
    /// Show a week's items (stored, or passed through from the plan)
    Show {
        /// Week as YYYY-Www (default: current week)
        #[arg(long)]
        week: Option<WeekId>,
    },
    /// Override an item's duration and notes for one week
    Edit {
        /// Budget item ID
        item: String,
        /// Weekly duration in minutes
        #[arg(long)]
        minutes: u32,
        #[arg(long, default_value = "")]
        notes: String,
        /// Week as YYYY-Www (default: current week)
        #[arg(long)]
        week: Option<WeekId>,
    },
    /// Reset a week: future weeks follow the plan again, others get plan
    /// durations back
    Reset {
        /// Week as YYYY-Www (default: current week)
        #[arg(long)]
        week: Option<WeekId>,
    },
    /// Reset one stored weekly item to its plan duration
    ResetItem {
        /// Weekly item ID
        id: String,
    },
}

pub fn run(action: WeekAction) -> CmdResult {
    let app = open_app()?;
    let user = app.user();
    let snapshots = app.snapshots();

    match action {
        WeekAction::Show { week } => {
            let week = week_or_current(week, &user);
            print_json(&snapshots.items_for_week(&user, week)?)?;
        }
        WeekAction::Edit {
            item,
            minutes,
            notes,
            week,
        } => {
            let week = week_or_current(week, &user);
            let update = WeeklyItemUpdate::new(minutes, notes);
            let row = if snapshots.is_materialized(&user, week)? {
                let stored = snapshots
                    .items_for_week(&user, week)?
                    .into_iter()
                    .find(|row| row.budget_item_id == item)
                    .and_then(|row| row.id)
                    .ok_or_else(|| format!("item {item} is not part of week {week}"))?;
                snapshots.update_item(&user, &stored, &update)?
            } else {
                snapshots.update_for_plan_item(&user, week, &item, &update)?
            };
            print_json(&row)?;
        }
        WeekAction::Reset { week } => {
            let week = week_or_current(week, &user);
            print_json(&snapshots.reset_week(&user, week)?)?;
        }
        WeekAction::ResetItem { id } => {
            print_json(&snapshots.reset_item(&user, &id)?)?;
        }
    }
    Ok(())
}
