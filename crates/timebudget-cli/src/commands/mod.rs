//! Subcommand implementations.

pub mod completions;
pub mod config;
pub mod item;
pub mod plan;
pub mod stats;
pub mod track;
pub mod week;

use chrono::Utc;
use serde::Serialize;
use timebudget_core::{App, Config, UserContext, WeekId};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Load the configuration and wire the core services.
pub fn open_app() -> Result<App, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(App::start(config)?)
}

/// The requested week, or the user's current one.
pub fn week_or_current(week: Option<WeekId>, user: &UserContext) -> WeekId {
    week.unwrap_or_else(|| user.week_of(Utc::now()))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
