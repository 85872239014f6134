use clap::Subcommand;
use timebudget_core::WeekId;

use super::{open_app, print_json, week_or_current, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Budgeted vs. tracked time for a week
    Week {
        /// Week as YYYY-Www (default: current week)
        #[arg(long)]
        week: Option<WeekId>,
    },
}

pub fn run(action: StatsAction) -> CmdResult {
    let app = open_app()?;
    let user = app.user();

    match action {
        StatsAction::Week { week } => {
            let week = week_or_current(week, &user);
            print_json(&app.stats().week_summary(&user, week)?)?;
        }
    }
    Ok(())
}
