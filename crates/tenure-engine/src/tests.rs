//! End-to-end tests for the lifecycle engine over the in-memory SQLite
//! store, with a frozen clock.

use chrono::{DateTime, TimeZone, Utc};
use tenure_core::{
  Error as CoreError,
  clock::FixedClock,
  entity::EntityKind,
  period::{MembershipKind, NewPeriod, PeriodKind},
  status::DerivedStatus,
  store::PeriodStore,
};
use tenure_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{Error, LifecycleActions, LifecycleRepository};

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// "Now" for every test: 2024-06-01.
fn test_now() -> DateTime<Utc> { day(2024, 6, 1) }

async fn setup() -> (SqliteStore, LifecycleActions<SqliteStore, FixedClock>) {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let clock = FixedClock::at(test_now());
  let actions =
    LifecycleActions::new(LifecycleRepository::new(store.clone(), clock));
  (store, actions)
}

fn is_cannot_transition(
  err: &Error<tenure_store_sqlite::Error>,
) -> bool {
  matches!(err, Error::Domain(CoreError::CannotTransition { .. }))
}

// ─── The employ/suspend/reinstate/retire walkthrough ─────────────────────────

#[tokio::test]
async fn full_wrestler_lifecycle_scenario() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let id = w.entity_id;
  assert_eq!(w.status, DerivedStatus::Unemployed);

  // Employ on 2024-01-01.
  let w = actions.employ(id, Some(day(2024, 1, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
  let employment =
    store.current_period(id, PeriodKind::Employment).await.unwrap().unwrap();
  assert_eq!(employment.started_at, day(2024, 1, 1));
  assert!(employment.is_open());

  // Suspend on 2024-02-01: employment stays open.
  let w = actions.suspend(id, Some(day(2024, 2, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Suspended);
  assert!(!w.status.is_bookable());
  assert!(store.has_open_period(id, PeriodKind::Employment).await.unwrap());
  let suspension =
    store.current_period(id, PeriodKind::Suspension).await.unwrap().unwrap();
  assert_eq!(suspension.started_at, day(2024, 2, 1));

  // Reinstate on 2024-03-01: suspension closes.
  let w = actions.reinstate(id, Some(day(2024, 3, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
  let suspension =
    store.previous_period(id, PeriodKind::Suspension).await.unwrap().unwrap();
  assert_eq!(suspension.ended_at, Some(day(2024, 3, 1)));

  // Retire on 2024-04-01: employment closes, retirement opens.
  let w = actions.retire(id, Some(day(2024, 4, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Retired);
  assert!(!store.has_open_period(id, PeriodKind::Employment).await.unwrap());
  let employment =
    store.previous_period(id, PeriodKind::Employment).await.unwrap().unwrap();
  assert_eq!(employment.ended_at, Some(day(2024, 4, 1)));
  let retirement =
    store.current_period(id, PeriodKind::Retirement).await.unwrap().unwrap();
  assert_eq!(retirement.started_at, day(2024, 4, 1));
}

// ─── Transition validation ───────────────────────────────────────────────────

#[tokio::test]
async fn employ_twice_is_rejected_with_no_new_periods() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  let err =
    actions.employ(w.entity_id, Some(day(2024, 2, 1))).await.unwrap_err();
  assert!(is_cannot_transition(&err));

  let employments =
    store.periods(w.entity_id, PeriodKind::Employment).await.unwrap();
  assert_eq!(employments.len(), 1);
}

#[tokio::test]
async fn retire_requires_a_career_to_end() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  let err = actions.retire(w.entity_id, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(CoreError::CannotTransition {
      action: "retire",
      status: DerivedStatus::Unemployed,
    })
  ));
  assert!(
    store
      .periods(w.entity_id, PeriodKind::Retirement)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn retire_twice_is_rejected() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  actions.retire(w.entity_id, Some(day(2024, 2, 1))).await.unwrap();

  let err =
    actions.retire(w.entity_id, Some(day(2024, 3, 1))).await.unwrap_err();
  assert!(is_cannot_transition(&err));
  assert_eq!(
    store.periods(w.entity_id, PeriodKind::Retirement).await.unwrap().len(),
    1
  );
}

#[tokio::test]
async fn suspend_requires_bookable() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  actions.injure(w.entity_id, Some(day(2024, 2, 1))).await.unwrap();

  let err =
    actions.suspend(w.entity_id, Some(day(2024, 3, 1))).await.unwrap_err();
  assert!(is_cannot_transition(&err));
}

#[tokio::test]
async fn future_dated_employment_is_pending_and_not_releasable() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  // Contract signed to start a month from "now".
  let w = actions.employ(w.entity_id, Some(day(2024, 7, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::PendingEmployment);

  let err = actions.release(w.entity_id, None).await.unwrap_err();
  assert!(is_cannot_transition(&err));
}

#[tokio::test]
async fn unknown_entity_is_not_found() {
  let (_store, actions) = setup().await;
  let err = actions.employ(Uuid::new_v4(), None).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::EntityNotFound(_))));
}

// ─── Injure / heal ───────────────────────────────────────────────────────────

#[tokio::test]
async fn injure_and_heal_round_trip() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let id = w.entity_id;

  actions.employ(id, Some(day(2024, 1, 1))).await.unwrap();
  let w = actions.injure(id, Some(day(2024, 2, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Injured);

  let w = actions.heal(id, Some(day(2024, 3, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
  let injury =
    store.previous_period(id, PeriodKind::Injury).await.unwrap().unwrap();
  assert_eq!(injury.started_at, day(2024, 2, 1));
  assert_eq!(injury.ended_at, Some(day(2024, 3, 1)));
}

// ─── Release ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn release_clears_suspension_memberships_and_contract() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let manager = store.add_entity(EntityKind::Manager).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let id = w.entity_id;

  actions.employ(id, Some(day(2024, 1, 1))).await.unwrap();
  repo
    .add_member(team.entity_id, id, MembershipKind::TagTeam, day(2024, 1, 5))
    .await
    .unwrap();
  repo
    .add_member(
      manager.entity_id,
      id,
      MembershipKind::Management,
      day(2024, 1, 5),
    )
    .await
    .unwrap();
  actions.suspend(id, Some(day(2024, 2, 1))).await.unwrap();

  let w = actions.release(id, Some(day(2024, 3, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Released);

  assert!(!store.has_open_period(id, PeriodKind::Employment).await.unwrap());
  assert!(!store.has_open_period(id, PeriodKind::Suspension).await.unwrap());
  assert!(
    repo
      .current_members(team.entity_id, MembershipKind::TagTeam)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    repo
      .current_members(manager.entity_id, MembershipKind::Management)
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Unretire ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unretire_lands_on_released_and_allows_reemploy() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let id = w.entity_id;

  actions.employ(id, Some(day(2023, 1, 1))).await.unwrap();
  actions.retire(id, Some(day(2023, 6, 1))).await.unwrap();

  let w = actions.unretire(id, Some(day(2024, 1, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Released);

  let w = actions.employ(id, Some(day(2024, 2, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
  assert_eq!(
    store.periods(id, PeriodKind::Employment).await.unwrap().len(),
    2
  );
}

// ─── Cascades ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn tag_team_retirement_retires_current_members() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let w1 = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let w2 = store.add_entity(EntityKind::Wrestler).await.unwrap();

  for id in [team.entity_id, w1.entity_id, w2.entity_id] {
    actions.employ(id, Some(day(2024, 1, 1))).await.unwrap();
  }
  for id in [w1.entity_id, w2.entity_id] {
    repo
      .add_member(team.entity_id, id, MembershipKind::TagTeam, day(2024, 1, 5))
      .await
      .unwrap();
  }

  let retired_on = day(2024, 4, 1);
  let team = actions.retire(team.entity_id, Some(retired_on)).await.unwrap();
  assert_eq!(team.status, DerivedStatus::Retired);

  for id in [w1.entity_id, w2.entity_id] {
    let w = store.get_entity(id).await.unwrap().unwrap();
    assert_eq!(w.status, DerivedStatus::Retired);
    let retirement = store
      .current_period(id, PeriodKind::Retirement)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(retirement.started_at, retired_on);
    assert!(!store.has_open_period(id, PeriodKind::Employment).await.unwrap());
  }
  assert!(
    repo
      .current_members(team.entity_id, MembershipKind::TagTeam)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn stable_retirement_cascades_transitively_and_deduplicates() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let stable = store.add_entity(EntityKind::Stable).await.unwrap();
  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let shared = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let solo = store.add_entity(EntityKind::Wrestler).await.unwrap();

  for id in
    [stable.entity_id, team.entity_id, shared.entity_id, solo.entity_id]
  {
    actions.employ(id, Some(day(2024, 1, 1))).await.unwrap();
  }
  // The team and the shared wrestler both sit in the stable; the shared
  // wrestler is also on the team.
  repo
    .add_member(
      stable.entity_id,
      team.entity_id,
      MembershipKind::Stable,
      day(2024, 1, 5),
    )
    .await
    .unwrap();
  repo
    .add_member(
      stable.entity_id,
      shared.entity_id,
      MembershipKind::Stable,
      day(2024, 1, 5),
    )
    .await
    .unwrap();
  repo
    .add_member(
      team.entity_id,
      shared.entity_id,
      MembershipKind::TagTeam,
      day(2024, 1, 6),
    )
    .await
    .unwrap();
  repo
    .add_member(
      team.entity_id,
      solo.entity_id,
      MembershipKind::TagTeam,
      day(2024, 1, 6),
    )
    .await
    .unwrap();

  actions.retire(stable.entity_id, Some(day(2024, 4, 1))).await.unwrap();

  for id in
    [stable.entity_id, team.entity_id, shared.entity_id, solo.entity_id]
  {
    let entity = store.get_entity(id).await.unwrap().unwrap();
    assert_eq!(entity.status, DerivedStatus::Retired, "entity {id}");
  }
  // Reached through both the stable and the team, retired exactly once.
  assert_eq!(
    store
      .periods(shared.entity_id, PeriodKind::Retirement)
      .await
      .unwrap()
      .len(),
    1
  );
}

#[tokio::test]
async fn tag_team_release_releases_current_members() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  actions.employ(team.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  repo
    .add_member(team.entity_id, w.entity_id, MembershipKind::TagTeam, day(2024, 1, 5))
    .await
    .unwrap();

  actions.release(team.entity_id, Some(day(2024, 3, 1))).await.unwrap();

  let w = store.get_entity(w.entity_id).await.unwrap().unwrap();
  assert_eq!(w.status, DerivedStatus::Released);
  assert!(
    repo
      .current_members(team.entity_id, MembershipKind::TagTeam)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn employ_from_retired_closes_the_retirement() {
  let (store, actions) = setup().await;
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let id = w.entity_id;

  actions.employ(id, Some(day(2023, 1, 1))).await.unwrap();
  actions.retire(id, Some(day(2023, 6, 1))).await.unwrap();

  let w = actions.employ(id, Some(day(2024, 1, 1))).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
  assert!(
    !store.has_open_period(id, PeriodKind::Retirement).await.unwrap()
  );
  let retirement =
    store.previous_period(id, PeriodKind::Retirement).await.unwrap().unwrap();
  assert_eq!(retirement.ended_at, Some(day(2024, 1, 1)));
}

#[tokio::test]
async fn manager_retirement_detaches_clients_without_touching_them() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let manager = store.add_entity(EntityKind::Manager).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(manager.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  repo
    .add_member(
      manager.entity_id,
      w.entity_id,
      MembershipKind::Management,
      day(2024, 1, 5),
    )
    .await
    .unwrap();

  actions.retire(manager.entity_id, Some(day(2024, 4, 1))).await.unwrap();

  let w = store.get_entity(w.entity_id).await.unwrap().unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
  assert!(
    repo
      .current_members(manager.entity_id, MembershipKind::Management)
      .await
      .unwrap()
      .is_empty()
  );
  let previous = repo
    .previous_members(manager.entity_id, MembershipKind::Management)
    .await
    .unwrap();
  assert_eq!(previous.len(), 1);
  assert_eq!(previous[0].entity_id, w.entity_id);
}

#[tokio::test]
async fn cascade_violation_aborts_without_writes() {
  let (store, actions) = setup().await;

  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  actions.employ(team.entity_id, Some(day(2024, 1, 1))).await.unwrap();

  // Wire up a membership behind the engine's back: the wrestler was never
  // employed, so the cascaded retire is illegal.
  store
    .open_period(NewPeriod::membership(
      &w,
      MembershipKind::TagTeam,
      team.entity_id,
      day(2024, 1, 5),
    ))
    .await
    .unwrap();

  let err =
    actions.retire(team.entity_id, Some(day(2024, 4, 1))).await.unwrap_err();
  assert!(is_cannot_transition(&err));

  // Nothing happened to the team either.
  let team = store.get_entity(team.entity_id).await.unwrap().unwrap();
  assert_eq!(team.status, DerivedStatus::Employed);
  assert!(
    store
      .periods(team.entity_id, PeriodKind::Retirement)
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Memberships ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn joining_a_second_team_closes_the_first_membership() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let t1 = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let t2 = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();

  repo
    .add_member(t1.entity_id, w.entity_id, MembershipKind::TagTeam, day(2024, 1, 5))
    .await
    .unwrap();
  repo
    .add_member(t2.entity_id, w.entity_id, MembershipKind::TagTeam, day(2024, 3, 1))
    .await
    .unwrap();

  let open = repo
    .current_memberships(w.entity_id, MembershipKind::TagTeam)
    .await
    .unwrap();
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].group_id, Some(t2.entity_id));

  let all = store
    .periods(w.entity_id, PeriodKind::Membership(MembershipKind::TagTeam))
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].group_id, Some(t1.entity_id));
  assert_eq!(all[0].ended_at, Some(day(2024, 3, 1)));
}

#[tokio::test]
async fn rejoining_the_current_team_is_rejected() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();
  repo
    .add_member(team.entity_id, w.entity_id, MembershipKind::TagTeam, day(2024, 1, 5))
    .await
    .unwrap();

  let err = repo
    .add_member(team.entity_id, w.entity_id, MembershipKind::TagTeam, day(2024, 2, 1))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(CoreError::DuplicateOpenPeriod { .. })
  ));
}

#[tokio::test]
async fn a_wrestler_may_have_several_managers_at_once() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let m1 = store.add_entity(EntityKind::Manager).await.unwrap();
  let m2 = store.add_entity(EntityKind::Manager).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  repo
    .add_member(m1.entity_id, w.entity_id, MembershipKind::Management, day(2024, 1, 5))
    .await
    .unwrap();
  repo
    .add_member(m2.entity_id, w.entity_id, MembershipKind::Management, day(2024, 2, 1))
    .await
    .unwrap();

  let open = repo
    .current_memberships(w.entity_id, MembershipKind::Management)
    .await
    .unwrap();
  assert_eq!(open.len(), 2);
}

#[tokio::test]
async fn add_member_rejects_wrong_group_kind() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let not_a_team = store.add_entity(EntityKind::Wrestler).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  let err = repo
    .add_member(
      not_a_team.entity_id,
      w.entity_id,
      MembershipKind::TagTeam,
      day(2024, 1, 5),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(CoreError::GroupKindMismatch { .. })
  ));
}

#[tokio::test]
async fn remove_member_is_a_no_op_when_not_a_member() {
  let (store, actions) = setup().await;
  let repo = actions.repository();

  let team = store.add_entity(EntityKind::TagTeam).await.unwrap();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  let removed = repo
    .remove_member(team.entity_id, w.entity_id, MembershipKind::TagTeam, test_now())
    .await
    .unwrap();
  assert!(!removed);
}

// ─── Repository-level behaviour ──────────────────────────────────────────────

#[tokio::test]
async fn end_employment_without_one_is_a_no_op() {
  let (store, actions) = setup().await;
  let repo = actions.repository();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  let w = repo.end_employment(w.entity_id, test_now()).await.unwrap();
  assert_eq!(w.status, DerivedStatus::Unemployed);
}

#[tokio::test]
async fn ending_a_period_before_it_started_is_rejected() {
  let (store, actions) = setup().await;
  let repo = actions.repository();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(w.entity_id, Some(day(2024, 3, 1))).await.unwrap();
  let err =
    repo.end_employment(w.entity_id, day(2024, 2, 1)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(CoreError::PeriodEndsBeforeStart { .. })
  ));
}

#[tokio::test]
async fn current_period_duration_measures_to_now() {
  let (store, actions) = setup().await;
  let repo = actions.repository();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  let days = repo
    .current_period_duration(w.entity_id, PeriodKind::Employment)
    .await
    .unwrap();
  // 2024-01-01 to 2024-06-01 in a leap year.
  assert_eq!(days, Some(152));

  assert_eq!(
    repo
      .current_period_duration(w.entity_id, PeriodKind::Suspension)
      .await
      .unwrap(),
    None
  );
}

#[tokio::test]
async fn refresh_status_repairs_a_drifted_cache() {
  let (store, actions) = setup().await;
  let repo = actions.repository();
  let w = store.add_entity(EntityKind::Wrestler).await.unwrap();

  actions.employ(w.entity_id, Some(day(2024, 1, 1))).await.unwrap();
  // Corrupt the cache behind the engine's back.
  store.set_status(w.entity_id, DerivedStatus::Retired).await.unwrap();

  let status = repo.refresh_status(w.entity_id).await.unwrap();
  assert_eq!(status, DerivedStatus::Employed);
  let w = store.get_entity(w.entity_id).await.unwrap().unwrap();
  assert_eq!(w.status, DerivedStatus::Employed);
}

#[tokio::test]
async fn title_activation_fills_the_employment_slot() {
  let (store, actions) = setup().await;
  let repo = actions.repository();
  let title = store.add_entity(EntityKind::Title).await.unwrap();

  let title = repo.create_activation(title.entity_id, day(2024, 1, 1)).await.unwrap();
  assert_eq!(title.status, DerivedStatus::Employed);

  let title = repo.end_activation(title.entity_id, day(2024, 3, 1)).await.unwrap();
  assert_eq!(title.status, DerivedStatus::Released);
}
