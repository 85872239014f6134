//! Plan item commands for CLI.

use clap::Subcommand;
use timebudget_core::{NewPlanItem, PlanItemChanges};

use super::{open_app, print_json, CmdResult};

#[derive(Subcommand)]
pub enum ItemAction {
    /// Append an item to a plan
    Add {
        /// Item name
        name: String,
        /// Weekly duration in minutes
        #[arg(long)]
        minutes: u32,
        /// Occurrences per week
        #[arg(long, default_value = "1")]
        occurrences: u32,
        #[arg(long, default_value = "")]
        icon: String,
        #[arg(long, default_value = "")]
        color: String,
        /// Plan ID (default: the current plan)
        #[arg(long)]
        plan: Option<String>,
    },
    /// Edit an item; stored weeks pick up name, icon, color and position
    Update {
        /// Item ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        occurrences: Option<u32>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Reorder an item
    Move {
        /// Item ID
        id: String,
        /// Place directly after this item
        #[arg(long, conflicts_with = "first", required_unless_present = "first")]
        after: Option<String>,
        /// Place before every other item
        #[arg(long)]
        first: bool,
    },
    /// Delete an item
    Delete {
        /// Item ID
        id: String,
    },
}

pub fn run(action: ItemAction) -> CmdResult {
    let app = open_app()?;
    let user = app.user();
    let plans = app.plans();

    match action {
        ItemAction::Add {
            name,
            minutes,
            occurrences,
            icon,
            color,
            plan,
        } => {
            let plan_id = match plan {
                Some(id) => id,
                None => plans.current_plan(&user)?.id,
            };
            let new = NewPlanItem::new(name, minutes)
                .with_occurrences(occurrences)
                .with_icon(icon)
                .with_color(color);
            print_json(&plans.add_item(&user, &plan_id, new)?)?;
        }
        ItemAction::Update {
            id,
            name,
            minutes,
            occurrences,
            icon,
            color,
        } => {
            let changes = PlanItemChanges {
                name,
                weekly_duration_min: minutes,
                weekly_occurrences: occurrences,
                icon,
                color,
            };
            if changes.is_empty() {
                return Err("nothing to update".into());
            }
            print_json(&plans.update_item(&user, &id, changes)?)?;
        }
        ItemAction::Move { id, after, .. } => {
            print_json(&plans.move_item_after(&user, &id, after.as_deref())?)?;
        }
        ItemAction::Delete { id } => {
            plans.delete_item(&user, &id)?;
            println!("deleted item {id}");
        }
    }
    Ok(())
}
