//! Budget plan commands for CLI.

use clap::Subcommand;

use super::{open_app, print_json, CmdResult};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Create a new plan (current if it is the first one)
    Create {
        /// Plan name
        name: String,
    },
    /// List all plans
    List,
    /// Show a plan with its items (default: the current plan)
    Show {
        /// Plan ID
        id: Option<String>,
    },
    /// Make a plan the current one
    Use {
        /// Plan ID
        id: String,
    },
    /// Rename a plan
    Rename {
        /// Plan ID
        id: String,
        /// New name
        name: String,
    },
    /// Delete a plan and its items
    Delete {
        /// Plan ID
        id: String,
    },
}

pub fn run(action: PlanAction) -> CmdResult {
    let app = open_app()?;
    let user = app.user();
    let plans = app.plans();

    match action {
        PlanAction::Create { name } => {
            let plan = plans.create_plan(&user, &name)?;
            eprintln!("Plan created: {}", plan.id);
            print_json(&plan)?;
        }
        PlanAction::List => {
            print_json(&plans.list_plans(&user)?)?;
        }
        PlanAction::Show { id } => {
            let plan = match id {
                Some(id) => plans.get_plan(&user, &id)?,
                None => plans.current_plan(&user)?,
            };
            print_json(&plan)?;
        }
        PlanAction::Use { id } => {
            let plan = plans.set_current_plan(&user, &id)?;
            println!("current plan: {} ({})", plan.name, plan.id);
        }
        PlanAction::Rename { id, name } => {
            print_json(&plans.rename_plan(&user, &id, &name)?)?;
        }
        PlanAction::Delete { id } => {
            plans.delete_plan(&user, &id)?;
            println!("deleted plan {id}");
        }
    }
    Ok(())
}
