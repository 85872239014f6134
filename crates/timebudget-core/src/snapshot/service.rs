//! Week-scoped reads, edits and resets, plus the bus subscribers that keep
//! stored snapshot rows in step with the authoritative plan.

use std::sync::Arc;

use chrono::{DateTime, Utc, Weekday};
use tracing::{debug, info, warn};

use super::{WeeklyItem, WeeklyItemUpdate};
use crate::bus::{DispatchContext, EventBus, Subscription};
use crate::error::{CoreError, Result};
use crate::events::{BudgetItemUpdated, CalendarEventCreated, BUDGET_ITEM_UPDATED, CALENDAR_EVENT_CREATED};
use crate::plan::{Plan, PlanReader};
use crate::storage::snapshot_db::LiveFields;
use crate::storage::{Database, PlanDb, SnapshotDb};
use crate::user::UserContext;
use crate::week::WeekId;

/// Owns materialization and field propagation for weekly snapshots.
pub struct WeeklySnapshotService {
    db: Arc<Database>,
    /// Week start used for bus deliveries that carry no acting user.
    default_week_start: Weekday,
}

fn pass_through(user_id: &str, week: WeekId, plan: &Plan) -> Vec<WeeklyItem> {
    plan.items
        .iter()
        .map(|item| WeeklyItem::pass_through(user_id, week, item))
        .collect()
}

/// Insert one row per plan item. A lost race on the uniqueness constraint is
/// reported as `SnapshotAlreadyMaterialized` so the caller's transaction
/// rolls back whatever this call managed to insert.
fn materialize(
    snapshots: &SnapshotDb<'_>,
    user_id: &str,
    week: WeekId,
    plan: &Plan,
    now: DateTime<Utc>,
) -> Result<usize> {
    match snapshots.create_from_plan(user_id, week, plan, now) {
        Err(CoreError::Database(e)) if e.is_constraint_violation() => {
            Err(CoreError::SnapshotAlreadyMaterialized {
                user_id: user_id.to_string(),
                week,
            })
        }
        other => other,
    }
}

impl WeeklySnapshotService {
    pub fn new(db: Arc<Database>, default_week_start: Weekday) -> Self {
        Self {
            db,
            default_week_start,
        }
    }

    /// Register the propagation and activity subscribers on `bus`.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Vec<Subscription> {
        let on_update = Arc::clone(self);
        let on_activity = Arc::clone(self);
        vec![
            bus.subscribe_typed::<BudgetItemUpdated, _>(BUDGET_ITEM_UPDATED, move |_ctx, event| {
                on_update.propagate_item_update(event)?;
                Ok(())
            }),
            bus.subscribe_typed::<CalendarEventCreated, _>(
                CALENDAR_EVENT_CREATED,
                move |ctx, event| {
                    on_activity.materialize_for_activity(ctx, event)?;
                    Ok(())
                },
            ),
        ]
    }

    pub fn is_materialized(&self, user: &UserContext, week: WeekId) -> Result<bool> {
        self.db
            .read(|conn| SnapshotDb::new(conn).week_exists(&user.user_id, week))
    }

    /// Stored rows if the week is materialized, else the current plan's items
    /// as unsaved pass-through rows.
    pub fn items_for_week(&self, user: &UserContext, week: WeekId) -> Result<Vec<WeeklyItem>> {
        self.db.read(|conn| {
            let rows = SnapshotDb::new(conn).for_week(&user.user_id, week)?;
            if !rows.is_empty() {
                return Ok(rows);
            }
            let plan = PlanDb::new(conn).current_plan(&user.user_id)?;
            Ok(pass_through(&user.user_id, week, &plan))
        })
    }

    /// Materialize an unmaterialized week and apply `update` to the new row
    /// of `budget_item_id`.
    ///
    /// # Errors
    /// `SnapshotAlreadyMaterialized` if the week already has rows, whatever
    /// plan is current now; otherwise `NoCurrentPlan` if the user has no
    /// current plan, `AuthoritativeItemNotFound` if the item is not in it.
    pub fn update_for_plan_item(
        &self,
        user: &UserContext,
        week: WeekId,
        budget_item_id: &str,
        update: &WeeklyItemUpdate,
    ) -> Result<WeeklyItem> {
        update.validate()?;
        let now = Utc::now();
        let row = self.db.transaction(|tx| {
            let snapshots = SnapshotDb::new(tx);
            if snapshots.week_exists(&user.user_id, week)? {
                return Err(CoreError::SnapshotAlreadyMaterialized {
                    user_id: user.user_id.clone(),
                    week,
                });
            }

            let plan = PlanDb::new(tx).current_plan(&user.user_id)?;
            if plan.item(budget_item_id).is_none() {
                return Err(CoreError::AuthoritativeItemNotFound {
                    item_id: budget_item_id.to_string(),
                });
            }
            let created = materialize(&snapshots, &user.user_id, week, &plan, now)?;
            info!(user = %user.user_id, %week, rows = created, "materialized week on edit");

            let row = snapshots
                .find_for_item(&user.user_id, week, budget_item_id)?
                .ok_or_else(|| CoreError::AuthoritativeItemNotFound {
                    item_id: budget_item_id.to_string(),
                })?;
            let id = row.id.as_deref().unwrap_or_default();
            snapshots.update_duration_and_notes(id, update.weekly_duration_min, &update.notes, now)?;
            Ok(WeeklyItem {
                weekly_duration_min: update.weekly_duration_min,
                notes: update.notes.clone(),
                ..row
            })
        })?;
        Ok(row)
    }

    /// Update duration and notes of a stored row.
    pub fn update_item(
        &self,
        user: &UserContext,
        snapshot_id: &str,
        update: &WeeklyItemUpdate,
    ) -> Result<WeeklyItem> {
        update.validate()?;
        let now = Utc::now();
        self.db.transaction(|tx| {
            let snapshots = SnapshotDb::new(tx);
            let row = snapshots
                .find_for_user(&user.user_id, snapshot_id)?
                .ok_or_else(|| CoreError::SnapshotItemNotFound {
                    snapshot_id: snapshot_id.to_string(),
                })?;
            snapshots.update_duration_and_notes(
                snapshot_id,
                update.weekly_duration_min,
                &update.notes,
                now,
            )?;
            Ok(WeeklyItem {
                weekly_duration_min: update.weekly_duration_min,
                notes: update.notes.clone(),
                ..row
            })
        })
    }

    /// Restore a row's duration from its authoritative item and clear notes.
    ///
    /// # Errors
    /// `SnapshotItemNotFound` if the row is missing, then
    /// `AuthoritativeItemNotFound` if its plan item was deleted.
    pub fn reset_item(&self, user: &UserContext, snapshot_id: &str) -> Result<WeeklyItem> {
        let now = Utc::now();
        self.db.transaction(|tx| {
            let snapshots = SnapshotDb::new(tx);
            let row = snapshots
                .find_for_user(&user.user_id, snapshot_id)?
                .ok_or_else(|| CoreError::SnapshotItemNotFound {
                    snapshot_id: snapshot_id.to_string(),
                })?;
            let item = PlanDb::new(tx).item(&row.budget_item_id)?;
            snapshots.update_duration_and_notes(snapshot_id, item.weekly_duration_min, "", now)?;
            Ok(WeeklyItem {
                weekly_duration_min: item.weekly_duration_min,
                notes: String::new(),
                ..row
            })
        })
    }

    pub fn reset_week(&self, user: &UserContext, week: WeekId) -> Result<Vec<WeeklyItem>> {
        self.reset_week_at(user, week, Utc::now())
    }

    /// Reset a week relative to `now`.
    ///
    /// A week after the current one is dropped back to unmaterialized and
    /// follows the live plan again. The current week and earlier ones keep
    /// their rows; each row gets its authoritative duration back and its
    /// notes cleared. Rows whose plan item was deleted are left untouched.
    pub fn reset_week_at(
        &self,
        user: &UserContext,
        week: WeekId,
        now: DateTime<Utc>,
    ) -> Result<Vec<WeeklyItem>> {
        let current = user.week_of(now);
        if week > current {
            let removed = self
                .db
                .transaction(|tx| SnapshotDb::new(tx).delete_week(&user.user_id, week))?;
            info!(user = %user.user_id, %week, removed, "reset future week to plan");
            return self.items_for_week(user, week);
        }

        let rows = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let snapshots = SnapshotDb::new(tx);
            let rows = snapshots.for_week(&user.user_id, week)?;
            for row in &rows {
                let Some(id) = row.id.as_deref() else {
                    continue;
                };
                match plans.find_item(&row.budget_item_id)? {
                    Some(item) => {
                        snapshots.update_duration_and_notes(id, item.weekly_duration_min, "", now)?;
                    }
                    None => warn!(
                        snapshot = id,
                        budget_item = %row.budget_item_id,
                        "budget item gone, leaving weekly item as is"
                    ),
                }
            }
            snapshots.for_week(&user.user_id, week)
        })?;

        if rows.is_empty() {
            return self.items_for_week(user, week);
        }
        info!(user = %user.user_id, %week, rows = rows.len(), "reset week in place");
        Ok(rows)
    }

    /// Copy an item's live fields into every stored week of its owner.
    ///
    /// Returns the number of rows touched; zero is a normal outcome.
    pub fn propagate_item_update(&self, event: &BudgetItemUpdated) -> Result<usize> {
        let now = Utc::now();
        let touched = self.db.transaction(|tx| {
            let plan = PlanDb::new(tx).find_plan(&event.plan_id)?.ok_or_else(|| {
                CoreError::PlanNotFound {
                    plan_id: event.plan_id.clone(),
                }
            })?;
            SnapshotDb::new(tx).update_live_fields(
                &plan.user_id,
                &event.id,
                LiveFields {
                    name: &event.name,
                    icon: &event.icon,
                    color: &event.color,
                    position: event.position,
                },
                now,
            )
        })?;
        debug!(budget_item = %event.id, touched, "propagated item update");
        Ok(touched)
    }

    /// Materialize the week an interval starts in, if it references a budget
    /// item and that week has no rows yet.
    ///
    /// Returns whether rows were created. Repeated deliveries are no-ops.
    pub fn materialize_for_activity(
        &self,
        ctx: &DispatchContext,
        event: &CalendarEventCreated,
    ) -> Result<bool> {
        let Some(item_id) = event.budget_item_id.as_deref() else {
            debug!(uid = %event.uid, "interval has no budget item");
            return Ok(false);
        };

        let now = Utc::now();
        let outcome = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let item = plans.item(item_id)?;
            let plan = plans.plan(&item.plan_id)?;
            let week_start = ctx
                .actor()
                .filter(|actor| actor.user_id == plan.user_id)
                .map_or(self.default_week_start, |actor| actor.week_start);
            let week = WeekId::from_datetime(event.start_time, week_start);

            let snapshots = SnapshotDb::new(tx);
            if snapshots.week_exists(&plan.user_id, week)? {
                return Ok(None);
            }
            let created = materialize(&snapshots, &plan.user_id, week, &plan, now)?;
            Ok(Some((plan.user_id, week, created)))
        });

        match outcome {
            Ok(Some((user_id, week, created))) => {
                info!(user = %user_id, %week, rows = created, uid = %event.uid, "materialized week on activity");
                Ok(true)
            }
            Ok(None) | Err(CoreError::SnapshotAlreadyMaterialized { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
