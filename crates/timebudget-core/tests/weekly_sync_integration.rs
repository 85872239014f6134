//! Integration tests for weekly snapshot synchronization.
//!
//! These tests drive the wired [`App`]: plan edits and recorded time flow
//! over the bus into the snapshot service, and week reads reflect the
//! result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc, Weekday};
use timebudget_core::bus::{DispatchContext, Envelope};
use timebudget_core::events::{BUDGET_ITEM_UPDATED, CALENDAR_EVENT_CREATED};
use timebudget_core::storage::PlanDb;
use timebudget_core::{
    App, CalendarEventCreated, Config, CoreError, Database, NewPlanItem, NewTimeEntry, PlanItem,
    PlanItemChanges, WeekId, WeeklyItem, WeeklyItemUpdate,
};

fn app_with(config: Config) -> App {
    App::with_database(config, Database::open_memory().unwrap())
}

fn app() -> App {
    app_with(Config::default())
}

/// Plan with A (2h, 2x) at 100 and B (1h, 1x) at 200.
fn seed(app: &App) -> (PlanItem, PlanItem) {
    let user = app.user();
    let plan = app.plans().create_plan(&user, "Default").unwrap();
    let a = app
        .plans()
        .add_item(
            &user,
            &plan.id,
            NewPlanItem::new("A", 120)
                .with_occurrences(2)
                .with_icon("book")
                .with_color("blue"),
        )
        .unwrap();
    let b = app
        .plans()
        .add_item(&user, &plan.id, NewPlanItem::new("B", 60))
        .unwrap();
    (a, b)
}

fn week() -> WeekId {
    WeekId::new(2026, 7).unwrap()
}

fn now_in_week() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap()
}

fn row_for<'a>(rows: &'a [WeeklyItem], item: &PlanItem) -> &'a WeeklyItem {
    rows.iter()
        .find(|r| r.budget_item_id == item.id)
        .expect("row for item")
}

#[test]
fn test_unmaterialized_week_mirrors_plan() {
    let app = app();
    let (a, b) = seed(&app);
    let user = app.user();

    let items = app.snapshots().items_for_week(&user, week()).unwrap();
    assert_eq!(items.len(), 2);
    for (row, item) in items.iter().zip([&a, &b]) {
        assert_eq!(row, &WeeklyItem::pass_through(&user.user_id, week(), item));
        assert!(!row.is_saved());
    }
}

#[test]
fn test_second_edit_materialization_conflicts() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    let update = WeeklyItemUpdate::new(90, "lighter week");

    let row = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &update)
        .unwrap();
    assert_eq!(row.weekly_duration_min, 90);

    let err = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &update)
        .unwrap_err();
    assert!(matches!(err, CoreError::SnapshotAlreadyMaterialized { .. }));
    assert!(err.is_conflict());
}

#[test]
fn test_plan_switch_between_edits_still_conflicts() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    app.snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(90, ""))
        .unwrap();

    let summer = app.plans().create_plan(&user, "Summer").unwrap();
    app.plans()
        .add_item(&user, &summer.id, NewPlanItem::new("Swim", 60))
        .unwrap();
    app.plans().set_current_plan(&user, &summer.id).unwrap();

    let err = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(45, ""))
        .unwrap_err();
    assert!(matches!(err, CoreError::SnapshotAlreadyMaterialized { .. }));
    assert!(err.is_conflict());

    let rows = app.snapshots().items_for_week(&user, week()).unwrap();
    assert_eq!(row_for(&rows, &a).weekly_duration_min, 90);
}

#[test]
fn test_oversized_budget_is_rejected_before_stats() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    let plan = app.plans().current_plan(&user).unwrap();

    let err = app
        .plans()
        .add_item(&user, &plan.id, NewPlanItem::new("Forever", u32::MAX))
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    let err = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(u32::MAX, ""))
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let summary = app.stats().week_summary(&user, week()).unwrap();
    assert_eq!(summary.total_budgeted_min, 180);
}

#[test]
fn test_item_update_propagates_live_fields_across_weeks() {
    let app = app();
    let (a, b) = seed(&app);
    let user = app.user();
    app.snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(90, "x"))
        .unwrap();
    app.snapshots()
        .update_for_plan_item(&user, week().next(), &b.id, &WeeklyItemUpdate::new(30, ""))
        .unwrap();

    app.plans()
        .update_item(
            &user,
            &a.id,
            PlanItemChanges {
                name: Some("Renamed".into()),
                icon: Some("star".into()),
                color: Some("red".into()),
                weekly_duration_min: Some(200),
                weekly_occurrences: Some(5),
            },
        )
        .unwrap();

    let first = app.snapshots().items_for_week(&user, week()).unwrap();
    let row = row_for(&first, &a);
    assert_eq!(row.name, "Renamed");
    assert_eq!(row.icon, "star");
    assert_eq!(row.color, "red");
    assert_eq!(row.weekly_duration_min, 90);
    assert_eq!(row.notes, "x");
    assert_eq!(row.weekly_occurrences, 2);

    let second = app.snapshots().items_for_week(&user, week().next()).unwrap();
    let row = row_for(&second, &a);
    assert_eq!(row.name, "Renamed");
    assert_eq!(row.weekly_duration_min, 120);
    assert_eq!(row.weekly_occurrences, 2);

    // Weeks never materialized follow the plan entirely.
    let later = app
        .snapshots()
        .items_for_week(&user, week().next().next())
        .unwrap();
    let row = row_for(&later, &a);
    assert_eq!((row.weekly_duration_min, row.weekly_occurrences), (200, 5));
}

#[test]
fn test_rename_keeps_override_scenario() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    app.snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(120, "x"))
        .unwrap();

    app.plans()
        .update_item(
            &user,
            &a.id,
            PlanItemChanges {
                name: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let rows = app.snapshots().items_for_week(&user, week()).unwrap();
    let row = row_for(&rows, &a);
    assert_eq!(row.name, "Renamed");
    assert_eq!(row.weekly_duration_min, 120);
    assert_eq!(row.notes, "x");
}

#[test]
fn test_reset_future_week_without_snapshot() {
    let app = app();
    let (a, b) = seed(&app);
    let user = app.user();
    let month_ahead = user.week_of(now_in_week() + Duration::weeks(4));

    let items = app
        .snapshots()
        .reset_week_at(&user, month_ahead, now_in_week())
        .unwrap();
    let ids: Vec<_> = items.iter().map(|i| i.budget_item_id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);
    assert!(items.iter().all(|i| !i.is_saved()));
    assert_eq!(items[0].weekly_duration_min, 120);
    assert!(!app.snapshots().is_materialized(&user, month_ahead).unwrap());
}

#[test]
fn test_reset_future_week_drops_overrides() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    let future = week().next();
    app.snapshots()
        .update_for_plan_item(&user, future, &a.id, &WeeklyItemUpdate::new(5, "skip"))
        .unwrap();

    let items = app
        .snapshots()
        .reset_week_at(&user, future, now_in_week())
        .unwrap();
    assert_eq!(row_for(&items, &a).weekly_duration_min, 120);
    assert!(!app.snapshots().is_materialized(&user, future).unwrap());
}

#[test]
fn test_reset_current_week_in_place() {
    let app = app();
    let (a, b) = seed(&app);
    let user = app.user();
    let row = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(5, "skip"))
        .unwrap();

    let rows = app
        .snapshots()
        .reset_week_at(&user, week(), now_in_week())
        .unwrap();
    assert_eq!(rows.len(), 2);
    let reset = row_for(&rows, &a);
    assert_eq!(reset.id, row.id);
    assert_eq!(reset.weekly_duration_min, 120);
    assert!(reset.notes.is_empty());
    assert_eq!(row_for(&rows, &b).weekly_duration_min, 60);
    assert!(app.snapshots().is_materialized(&user, week()).unwrap());
}

#[test]
fn test_reset_one_restores_authoritative_duration() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    let row = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(120, "x"))
        .unwrap();

    app.plans()
        .update_item(
            &user,
            &a.id,
            PlanItemChanges {
                weekly_duration_min: Some(180),
                ..Default::default()
            },
        )
        .unwrap();

    let reset = app
        .snapshots()
        .reset_item(&user, row.id.as_deref().unwrap())
        .unwrap();
    assert_eq!(reset.weekly_duration_min, 180);
    assert!(reset.notes.is_empty());
    assert_eq!(reset.name, row.name);
    assert_eq!(reset.icon, row.icon);
    assert_eq!(reset.color, row.color);
    assert_eq!(reset.position, row.position);
}

#[test]
fn test_reset_one_after_item_deleted() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    let row = app
        .snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(10, ""))
        .unwrap();
    app.plans().delete_item(&user, &a.id).unwrap();

    let err = app
        .snapshots()
        .reset_item(&user, row.id.as_deref().unwrap())
        .unwrap_err();
    assert!(matches!(err, CoreError::AuthoritativeItemNotFound { .. }));

    // The orphaned row survives a week reset untouched.
    let rows = app
        .snapshots()
        .reset_week_at(&user, week(), now_in_week())
        .unwrap();
    assert_eq!(row_for(&rows, &a).weekly_duration_min, 10);
}

#[test]
fn test_recorded_activity_materializes_week_once() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    let start = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
    let activity_week = user.week_of(start);

    app.tracking()
        .record(
            &user,
            NewTimeEntry::new(start, start + Duration::minutes(30)).for_item(&a.id),
        )
        .unwrap();
    let rows = app.snapshots().items_for_week(&user, activity_week).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(WeeklyItem::is_saved));

    app.tracking()
        .record(
            &user,
            NewTimeEntry::new(start + Duration::hours(2), start + Duration::hours(3))
                .for_item(&a.id),
        )
        .unwrap();
    let again = app.snapshots().items_for_week(&user, activity_week).unwrap();
    assert_eq!(again, rows);
}

#[test]
fn test_activity_without_item_leaves_week_alone() {
    let app = app();
    seed(&app);
    let user = app.user();
    let start = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();

    app.tracking()
        .record(
            &user,
            NewTimeEntry::new(start, start + Duration::minutes(30)).with_summary("errand"),
        )
        .unwrap();
    assert!(!app
        .snapshots()
        .is_materialized(&user, user.week_of(start))
        .unwrap());
}

#[test]
fn test_activity_uses_actor_week_start() {
    let mut config = Config::default();
    config.week.start_day = Weekday::Sun;
    let app = app_with(config);
    let (a, _) = seed(&app);
    let user = app.user();
    // Sunday 2026-02-15 opens the Sunday-based week numbered W08; for a
    // Monday start it would still belong to W07.
    let start = Utc.with_ymd_and_hms(2026, 2, 15, 10, 0, 0).unwrap();

    app.tracking()
        .record(
            &user,
            NewTimeEntry::new(start, start + Duration::hours(1)).for_item(&a.id),
        )
        .unwrap();
    assert!(app
        .snapshots()
        .is_materialized(&user, WeekId::new(2026, 8).unwrap())
        .unwrap());
    assert!(!app.snapshots().is_materialized(&user, week()).unwrap());
}

#[test]
fn test_activity_without_actor_uses_configured_week_start() {
    let mut config = Config::default();
    config.week.start_day = Weekday::Sun;
    let app = app_with(config);
    let (a, _) = seed(&app);
    let start = Utc.with_ymd_and_hms(2026, 2, 15, 10, 0, 0).unwrap();

    app.bus()
        .publish_payload(
            CALENDAR_EVENT_CREATED,
            CalendarEventCreated {
                uid: "external".into(),
                summary: "imported".into(),
                start_time: start,
                end_time: start + Duration::hours(1),
                budget_item_id: Some(a.id.clone()),
            },
            DispatchContext::new(),
        )
        .unwrap();
    assert!(app
        .snapshots()
        .is_materialized(&app.user(), WeekId::new(2026, 8).unwrap())
        .unwrap());
}

#[test]
fn test_move_with_renumber_publishes_every_changed_item() {
    let app = app();
    let (a, b) = seed(&app);
    let user = app.user();
    let plan_id = a.plan_id.clone();
    let c = app
        .plans()
        .add_item(&user, &plan_id, NewPlanItem::new("C", 15))
        .unwrap();
    app.database()
        .read(|conn| PlanDb::new(conn).update_position(&b.id, 101))
        .unwrap();
    app.snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(120, ""))
        .unwrap();

    let published = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&published);
    app.bus().subscribe(BUDGET_ITEM_UPDATED, move |_env: &Envelope| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let moved = app.plans().move_item_after(&user, &c.id, Some(a.id.as_str())).unwrap();
    assert_eq!(moved.position, 150);
    assert_eq!(published.load(Ordering::SeqCst), 2);

    let plan = app.plans().get_plan(&user, &plan_id).unwrap();
    let positions: Vec<_> = plan.items.iter().map(|i| (i.name.as_str(), i.position)).collect();
    assert_eq!(positions, vec![("A", 100), ("C", 150), ("B", 200)]);

    let rows = app.snapshots().items_for_week(&user, week()).unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "C", "B"]);
}

#[test]
fn test_failing_subscriber_does_not_roll_back() {
    let app = app();
    let (a, _) = seed(&app);
    let user = app.user();
    app.snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(60, ""))
        .unwrap();
    app.bus()
        .subscribe(BUDGET_ITEM_UPDATED, |_env: &Envelope| panic!("downstream exploded"));

    let err = app
        .plans()
        .update_item(
            &user,
            &a.id,
            PlanItemChanges {
                name: Some("Kept".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    let publish = match err {
        CoreError::Publish(publish) => publish,
        other => panic!("expected publish error, got {other:?}"),
    };
    assert_eq!(publish.failures().len(), 1);
    assert!(publish.failures()[0].is_panic());

    assert_eq!(app.plans().get_item(&user, &a.id).unwrap().name, "Kept");
    let rows = app.snapshots().items_for_week(&user, week()).unwrap();
    assert_eq!(row_for(&rows, &a).name, "Kept");
}

#[test]
fn test_expired_dispatch_leaves_snapshot_stale() {
    let mut config = Config::default();
    config.bus.dispatch_timeout_ms = Some(0);
    let app = app_with(config);
    let (a, _) = seed(&app);
    let user = app.user();
    app.snapshots()
        .update_for_plan_item(&user, week(), &a.id, &WeeklyItemUpdate::new(60, ""))
        .unwrap();

    let err = app
        .plans()
        .update_item(
            &user,
            &a.id,
            PlanItemChanges {
                name: Some("Late".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Publish(ref e) if e.is_cancelled()));

    assert_eq!(app.plans().get_item(&user, &a.id).unwrap().name, "Late");
    let rows = app.snapshots().items_for_week(&user, week()).unwrap();
    assert_eq!(row_for(&rows, &a).name, "A");
}

#[test]
fn test_concurrent_edits_materialize_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(dir.path().join("race.db")).unwrap();
    let app = App::with_database(Config::default(), db);
    let (a, b) = seed(&app);
    let user = app.user();

    let outcomes: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = [&a, &b]
            .into_iter()
            .map(|item| {
                let (app, user) = (&app, &user);
                s.spawn(move || {
                    app.snapshots().update_for_plan_item(
                        user,
                        week(),
                        &item.id,
                        &WeeklyItemUpdate::new(1, ""),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .all(CoreError::is_conflict));
    let rows = app.snapshots().items_for_week(&user, week()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(WeeklyItem::is_saved));
}

#[test]
fn test_separate_connections_materialize_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let editor = App::with_database(Config::default(), Database::open_at(&path).unwrap());
    let (a, b) = seed(&editor);
    let tracker = App::with_database(Config::default(), Database::open_at(&path).unwrap());
    let user = editor.user();
    let start = now_in_week();

    let (edited, recorded) = std::thread::scope(|s| {
        let edit = s.spawn(|| {
            editor.snapshots().update_for_plan_item(
                &user,
                week(),
                &b.id,
                &WeeklyItemUpdate::new(15, ""),
            )
        });
        let record = s.spawn(|| {
            tracker.tracking().record(
                &user,
                NewTimeEntry::new(start, start + Duration::minutes(30)).for_item(&a.id),
            )
        });
        (edit.join().unwrap(), record.join().unwrap())
    });

    assert!(recorded.is_ok());
    match edited {
        Ok(row) => assert_eq!(row.weekly_duration_min, 15),
        Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
    }
    for handle in [&editor, &tracker] {
        let rows = handle.snapshots().items_for_week(&user, week()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(WeeklyItem::is_saved));
    }
}

#[test]
fn test_week_summary_joins_budget_and_tracking() {
    let app = app();
    let (a, b) = seed(&app);
    let user = app.user();
    let start = Utc.with_ymd_and_hms(2026, 2, 11, 7, 0, 0).unwrap();
    app.tracking()
        .record(
            &user,
            NewTimeEntry::new(start, start + Duration::minutes(150)).for_item(&a.id),
        )
        .unwrap();
    app.tracking()
        .record(
            &user,
            NewTimeEntry::new(start + Duration::hours(5), start + Duration::hours(6)),
        )
        .unwrap();

    let summary = app.stats().week_summary(&user, week()).unwrap();
    assert!(summary.materialized);
    let progress_a = summary
        .items
        .iter()
        .find(|p| p.budget_item_id == a.id)
        .unwrap();
    assert_eq!(progress_a.tracked_min, 150);
    assert_eq!(progress_a.over_min, 30);
    let progress_b = summary
        .items
        .iter()
        .find(|p| p.budget_item_id == b.id)
        .unwrap();
    assert_eq!(progress_b.remaining_min, 60);
    assert_eq!(summary.unbudgeted_min, 60);
    assert_eq!(summary.total_tracked_min, 210);
}

#[test]
fn test_state_survives_restart_and_shutdown_unsubscribes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.database_path = Some(dir.path().join("budget.db"));

    let app = App::start(config.clone()).unwrap();
    let (a, _) = seed(&app);
    app.snapshots()
        .update_for_plan_item(&app.user(), week(), &a.id, &WeeklyItemUpdate::new(42, "n"))
        .unwrap();
    let bus = Arc::clone(app.bus());
    assert_eq!(bus.subscriber_count(BUDGET_ITEM_UPDATED), 1);
    app.shutdown();
    assert_eq!(bus.subscriber_count(BUDGET_ITEM_UPDATED), 0);
    assert_eq!(bus.subscriber_count(CALENDAR_EVENT_CREATED), 0);

    let reopened = App::start(config).unwrap();
    let rows = reopened
        .snapshots()
        .items_for_week(&reopened.user(), week())
        .unwrap();
    assert_eq!(row_for(&rows, &a).weekly_duration_min, 42);
    assert_eq!(row_for(&rows, &a).notes, "n");
}
