use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    validate_duration, validate_name, NewPlanItem, Plan, PlanItem, PlanItemChanges, PlanReader,
};
use crate::bus::{DispatchContext, EventBus};
use crate::error::{CoreError, Result};
use crate::events::{BudgetItemUpdated, BUDGET_ITEM_UPDATED};
use crate::position::{append_position, place_after, Slot};
use crate::storage::{Database, PlanDb};
use crate::user::UserContext;

fn owned_plan(plans: &PlanDb<'_>, user: &UserContext, plan_id: &str) -> Result<Plan> {
    let plan = plans.plan(plan_id)?;
    if plan.user_id != user.user_id {
        return Err(CoreError::PlanNotFound {
            plan_id: plan_id.to_string(),
        });
    }
    Ok(plan)
}

fn owned_item(plans: &PlanDb<'_>, user: &UserContext, item_id: &str) -> Result<PlanItem> {
    let item = plans.item(item_id)?;
    let owner = plans.find_plan(&item.plan_id)?.map(|p| p.user_id);
    if owner.as_deref() != Some(user.user_id.as_str()) {
        return Err(CoreError::AuthoritativeItemNotFound {
            item_id: item_id.to_string(),
        });
    }
    Ok(item)
}

fn slots(items: &[PlanItem]) -> Vec<Slot<String>> {
    items
        .iter()
        .map(|i| Slot::new(i.id.clone(), i.position))
        .collect()
}

/// Owns authoritative plans and items and announces item changes.
pub struct PlanService {
    db: Arc<Database>,
    bus: Arc<EventBus>,
    dispatch_timeout: Option<Duration>,
}

impl PlanService {
    pub fn new(db: Arc<Database>, bus: Arc<EventBus>, dispatch_timeout: Option<Duration>) -> Self {
        Self {
            db,
            bus,
            dispatch_timeout,
        }
    }

    // === Plans ===

    /// Create an empty plan. It becomes current if the user has none.
    pub fn create_plan(&self, user: &UserContext, name: &str) -> Result<Plan> {
        validate_name("name", name)?;
        let plan = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let plan = Plan {
                id: Uuid::new_v4().to_string(),
                user_id: user.user_id.clone(),
                name: name.trim().to_string(),
                is_current: !plans.has_current_plan(&user.user_id)?,
                created_at: Utc::now(),
                items: Vec::new(),
            };
            plans.insert_plan(&plan)?;
            Ok(plan)
        })?;
        info!(user = %user.user_id, plan = %plan.id, current = plan.is_current, "created plan");
        Ok(plan)
    }

    pub fn list_plans(&self, user: &UserContext) -> Result<Vec<Plan>> {
        self.db
            .read(|conn| PlanDb::new(conn).list_plans(&user.user_id))
    }

    pub fn current_plan(&self, user: &UserContext) -> Result<Plan> {
        self.db
            .read(|conn| PlanDb::new(conn).current_plan(&user.user_id))
    }

    pub fn get_plan(&self, user: &UserContext, plan_id: &str) -> Result<Plan> {
        self.db
            .read(|conn| owned_plan(&PlanDb::new(conn), user, plan_id))
    }

    /// Make `plan_id` the user's only current plan.
    ///
    /// Existing weekly snapshots keep the plan they were materialized from;
    /// unmaterialized weeks follow the new plan from now on.
    pub fn set_current_plan(&self, user: &UserContext, plan_id: &str) -> Result<Plan> {
        let plan = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            if !plans.set_current_plan(&user.user_id, plan_id)? {
                return Err(CoreError::PlanNotFound {
                    plan_id: plan_id.to_string(),
                });
            }
            plans.plan(plan_id)
        })?;
        info!(user = %user.user_id, plan = %plan.id, "switched current plan");
        Ok(plan)
    }

    pub fn rename_plan(&self, user: &UserContext, plan_id: &str, name: &str) -> Result<Plan> {
        validate_name("name", name)?;
        self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            owned_plan(&plans, user, plan_id)?;
            plans.rename_plan(plan_id, name.trim())?;
            plans.plan(plan_id)
        })
    }

    /// Delete a plan and its items. Snapshot rows materialized from it stay
    /// as history.
    pub fn delete_plan(&self, user: &UserContext, plan_id: &str) -> Result<()> {
        let removed = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let plan = owned_plan(&plans, user, plan_id)?;
            plans.delete_plan(plan_id)?;
            Ok(plan)
        })?;
        info!(
            user = %user.user_id,
            plan = %removed.id,
            items = removed.items.len(),
            was_current = removed.is_current,
            "deleted plan"
        );
        Ok(())
    }

    // === Items ===

    /// Append an item after the plan's last one.
    pub fn add_item(&self, user: &UserContext, plan_id: &str, new: NewPlanItem) -> Result<PlanItem> {
        validate_name("name", &new.name)?;
        validate_duration(new.weekly_duration_min)?;
        let item = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let plan = owned_plan(&plans, user, plan_id)?;
            let item = PlanItem {
                id: Uuid::new_v4().to_string(),
                plan_id: plan.id.clone(),
                name: new.name.trim().to_string(),
                weekly_duration_min: new.weekly_duration_min,
                weekly_occurrences: new.weekly_occurrences,
                icon: new.icon,
                color: new.color,
                position: append_position(&slots(&plan.items)),
            };
            plans.insert_item(&item)?;
            Ok(item)
        })?;
        debug!(plan = %plan_id, item = %item.id, position = item.position, "added item");
        Ok(item)
    }

    pub fn get_item(&self, user: &UserContext, item_id: &str) -> Result<PlanItem> {
        self.db
            .read(|conn| owned_item(&PlanDb::new(conn), user, item_id))
    }

    /// Apply `changes` and publish the item's full field set.
    ///
    /// # Errors
    /// `Publish` if a subscriber failed; the edit itself stays committed.
    pub fn update_item(
        &self,
        user: &UserContext,
        item_id: &str,
        changes: PlanItemChanges,
    ) -> Result<PlanItem> {
        if let Some(name) = changes.name.as_deref() {
            validate_name("name", name)?;
        }
        if let Some(minutes) = changes.weekly_duration_min {
            validate_duration(minutes)?;
        }
        let item = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let mut item = owned_item(&plans, user, item_id)?;
            changes.apply(&mut item);
            plans.update_item(&item)?;
            Ok(item)
        })?;
        self.publish_updates(user, std::slice::from_ref(&item))?;
        Ok(item)
    }

    /// Move `item_id` directly after `after`, or to the front when `after`
    /// is `None`.
    ///
    /// Every item whose position changed, the moved one and any renumbered
    /// siblings, is announced after the write commits.
    ///
    /// # Errors
    /// `AuthoritativeItemNotFound` if either item is missing or the anchor is
    /// not a sibling.
    pub fn move_item_after(
        &self,
        user: &UserContext,
        item_id: &str,
        after: Option<&str>,
    ) -> Result<PlanItem> {
        let (moved, changed) = self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            let mut moved = owned_item(&plans, user, item_id)?;
            let siblings = plans.items_for_plan(&moved.plan_id)?;

            let anchor = after.map(str::to_string);
            let placement = place_after(&slots(&siblings), &moved.id, anchor.as_ref())
                .ok_or_else(|| CoreError::AuthoritativeItemNotFound {
                    item_id: after.unwrap_or_default().to_string(),
                })?;

            let mut changed = Vec::new();
            for slot in &placement.renumbered {
                let Some(sibling) = siblings.iter().find(|s| s.id == slot.key) else {
                    continue;
                };
                if sibling.position != slot.position {
                    plans.update_position(&sibling.id, slot.position)?;
                    changed.push(PlanItem {
                        position: slot.position,
                        ..sibling.clone()
                    });
                }
            }
            if placement.needed_renumber() {
                info!(plan = %moved.plan_id, renumbered = changed.len(), "renumbered plan items");
            }

            if moved.position != placement.position {
                moved.position = placement.position;
                plans.update_position(&moved.id, moved.position)?;
                changed.push(moved.clone());
            }
            Ok((moved, changed))
        })?;

        self.publish_updates(user, &changed)?;
        Ok(moved)
    }

    /// Delete an item. Snapshot rows referencing it are kept.
    pub fn delete_item(&self, user: &UserContext, item_id: &str) -> Result<()> {
        self.db.transaction(|tx| {
            let plans = PlanDb::new(tx);
            owned_item(&plans, user, item_id)?;
            plans.delete_item(item_id)?;
            Ok(())
        })?;
        debug!(item = %item_id, "deleted item");
        Ok(())
    }

    /// Publish one update per item, in order. Every item is attempted; the
    /// first failure is returned.
    fn publish_updates(&self, user: &UserContext, items: &[PlanItem]) -> Result<()> {
        let ctx = DispatchContext::for_actor(user.clone(), self.dispatch_timeout);
        let mut first_error = None;
        for item in items {
            let outcome =
                self.bus
                    .publish_payload(BUDGET_ITEM_UPDATED, BudgetItemUpdated::from(item), ctx.clone());
            if let Err(err) = outcome {
                warn!(item = %item.id, error = %err, "item update not fully propagated");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
