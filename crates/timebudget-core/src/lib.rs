//! # Timebudget Core Library
//!
//! Core logic for a personal time-budgeting tool. Users keep a budget plan
//! of weekly time allocations, track intervals against it, and review each
//! week. Every operation is available through the CLI binary, which is a thin
//! layer over this library.
//!
//! ## Architecture
//!
//! - **Event bus**: synchronous in-process publish/subscribe with typed
//!   subscriptions, panic containment and cooperative cancellation
//! - **Plans**: authoritative plans and items; item edits publish
//!   `budget_plan.item.updated`
//! - **Weekly snapshots**: per-week working copies of the plan, materialized
//!   lazily and kept in step with the plan by bus subscribers
//! - **Tracking**: recorded intervals, published as `calendar.event.created`
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`App`]: wires storage, bus and services together
//! - [`EventBus`]: topic-keyed dispatch
//! - [`WeeklySnapshotService`]: week-scoped reads, edits and resets
//! - [`PlanService`]: plan and item mutations
//! - [`position`]: ordering keys for plan items

pub mod bus;
pub mod error;
pub mod events;
pub mod plan;
pub mod position;
pub mod snapshot;
pub mod stats;
pub mod storage;
pub mod tracking;
pub mod user;
pub mod week;

pub use bus::{DispatchContext, Envelope, EventBus, PublishError, Subscription, Topic};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{BudgetItemUpdated, CalendarEventCreated};
pub use plan::{NewPlanItem, Plan, PlanItem, PlanItemChanges, PlanReader, PlanService};
pub use snapshot::{WeeklyItem, WeeklyItemUpdate, WeeklySnapshotService};
pub use stats::{StatsService, WeekSummary};
pub use storage::{Config, Database};
pub use tracking::{NewTimeEntry, TimeEntry, TrackingService};
pub use user::UserContext;
pub use week::WeekId;

use std::sync::Arc;

use tracing::debug;

/// A running instance: one database, one bus, the services on top of them
/// and the snapshot subscribers registered on the bus.
pub struct App {
    config: Config,
    db: Arc<Database>,
    bus: Arc<EventBus>,
    plans: PlanService,
    snapshots: Arc<WeeklySnapshotService>,
    tracking: Arc<TrackingService>,
    stats: StatsService,
    subscriptions: Vec<Subscription>,
}

impl App {
    /// Open the configured database and wire the services.
    pub fn start(config: Config) -> Result<Self> {
        let db = config.open_database()?;
        Ok(Self::with_database(config, db))
    }

    /// Wire the services over an already opened database.
    pub fn with_database(config: Config, db: Database) -> Self {
        let db = Arc::new(db);
        let bus = Arc::new(EventBus::new());
        let timeout = config.dispatch_timeout();

        let snapshots = Arc::new(WeeklySnapshotService::new(
            Arc::clone(&db),
            config.week.start_day,
        ));
        let subscriptions = snapshots.subscribe(&bus);
        let plans = PlanService::new(Arc::clone(&db), Arc::clone(&bus), timeout);
        let tracking = Arc::new(TrackingService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            timeout,
        ));
        let stats = StatsService::new(Arc::clone(&snapshots), Arc::clone(&tracking));
        debug!(subscriptions = subscriptions.len(), "app wired");

        Self {
            config,
            db,
            bus,
            plans,
            snapshots,
            tracking,
            stats,
            subscriptions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The configured acting user.
    pub fn user(&self) -> UserContext {
        self.config.user_context()
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn plans(&self) -> &PlanService {
        &self.plans
    }

    pub fn snapshots(&self) -> &WeeklySnapshotService {
        &self.snapshots
    }

    pub fn tracking(&self) -> &TrackingService {
        &self.tracking
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    /// Remove the snapshot subscribers from the bus.
    pub fn shutdown(self) {
        let removed = self
            .subscriptions
            .iter()
            .filter(|s| s.unsubscribe())
            .count();
        debug!(removed, "app shut down");
    }
}
