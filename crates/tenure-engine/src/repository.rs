//! [`LifecycleRepository`] — per-entity period operations over a store.
//!
//! Every mutation here is planned as a [`PeriodOp`] batch and handed to
//! [`PeriodStore::apply`], so a composite transition ("close the contract,
//! sever the memberships, open retirement, cache the new status") commits
//! or rolls back as one unit. The planning helpers are shared with the
//! action layer, which stitches several entities' plans into one batch when
//! a transition cascades.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tenure_core::{
  Error as CoreError,
  clock::Clock,
  entity::Entity,
  period::{MembershipKind, NewPeriod, Period, PeriodKind},
  status::{DerivedStatus, StatusSnapshot, project},
  store::{PeriodOp, PeriodStore},
};

use crate::error::{Error, Result};

// ─── Planning helpers ────────────────────────────────────────────────────────
// Each helper appends ops and keeps the in-memory snapshot in step, so the
// final status projection sees the state the batch will leave behind.

pub(crate) fn plan_open(
  entity: &Entity,
  snap: &mut StatusSnapshot,
  kind: PeriodKind,
  at: DateTime<Utc>,
  ops: &mut Vec<PeriodOp>,
) {
  ops.push(PeriodOp::Open(NewPeriod::new(entity, kind, at)));
  match kind {
    PeriodKind::Employment | PeriodKind::Activation => {
      snap.employed_since = Some(at);
    }
    PeriodKind::Suspension => snap.suspended_since = Some(at),
    PeriodKind::Injury => snap.injured_since = Some(at),
    PeriodKind::Retirement => snap.retired_since = Some(at),
    PeriodKind::Membership(_) => {}
  }
}

/// Plan closing the open period of `kind`, if any. Returns `false` when
/// nothing was open. Rejects an end timestamp earlier than the start.
pub(crate) fn plan_close(
  entity: &Entity,
  snap: &mut StatusSnapshot,
  kind: PeriodKind,
  at: DateTime<Utc>,
  ops: &mut Vec<PeriodOp>,
) -> tenure_core::Result<bool> {
  let since = match kind {
    PeriodKind::Employment | PeriodKind::Activation => snap.employed_since,
    PeriodKind::Suspension => snap.suspended_since,
    PeriodKind::Injury => snap.injured_since,
    PeriodKind::Retirement => snap.retired_since,
    // Memberships are closed via plan_detach_memberships, which knows the
    // group ids.
    PeriodKind::Membership(_) => None,
  };
  let Some(started) = since else {
    return Ok(false);
  };
  if at < started {
    return Err(CoreError::PeriodEndsBeforeStart {
      owner_id: entity.entity_id,
    });
  }

  ops.push(PeriodOp::Close {
    owner_id: entity.entity_id,
    kind,
    group_id: None,
    ended_at: at,
  });
  match kind {
    PeriodKind::Employment | PeriodKind::Activation => {
      snap.employed_since = None;
      snap.previously_employed = true;
    }
    PeriodKind::Suspension => snap.suspended_since = None,
    PeriodKind::Injury => snap.injured_since = None,
    PeriodKind::Retirement => snap.retired_since = None,
    PeriodKind::Membership(_) => {}
  }
  Ok(true)
}

/// Project the snapshot and plan the status-cache rewrite.
pub(crate) fn plan_status(
  entity: &Entity,
  snap: &StatusSnapshot,
  now: DateTime<Utc>,
  ops: &mut Vec<PeriodOp>,
) -> DerivedStatus {
  let status = project(snap, now);
  ops.push(PeriodOp::SetStatus { entity_id: entity.entity_id, status });
  status
}

// ─── Repository ──────────────────────────────────────────────────────────────

pub struct LifecycleRepository<S, C> {
  store: S,
  clock: C,
}

impl<S: PeriodStore, C: Clock> LifecycleRepository<S, C> {
  pub fn new(store: S, clock: C) -> Self { Self { store, clock } }

  pub fn store(&self) -> &S { &self.store }

  pub(crate) fn clock(&self) -> &C { &self.clock }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch an entity, turning absence into an error.
  pub async fn entity(&self, id: Uuid) -> Result<Entity, S::Error> {
    self
      .store
      .get_entity(id)
      .await
      .map_err(Error::Store)?
      .ok_or_else(|| CoreError::EntityNotFound(id).into())
  }

  /// Read the open-period facts the projection runs on. For titles the
  /// employment slot is filled by the activation run.
  pub async fn snapshot_of(
    &self,
    entity: &Entity,
  ) -> Result<StatusSnapshot, S::Error> {
    let id = entity.entity_id;
    let tenure = entity.kind.employment_kind();

    let employment =
      self.store.current_period(id, tenure).await.map_err(Error::Store)?;
    let previously = self
      .store
      .previous_period(id, tenure)
      .await
      .map_err(Error::Store)?
      .is_some();
    let retirement = self
      .store
      .current_period(id, PeriodKind::Retirement)
      .await
      .map_err(Error::Store)?;
    let suspension = self
      .store
      .current_period(id, PeriodKind::Suspension)
      .await
      .map_err(Error::Store)?;
    let injury = self
      .store
      .current_period(id, PeriodKind::Injury)
      .await
      .map_err(Error::Store)?;

    Ok(StatusSnapshot {
      retired_since:       retirement.map(|p| p.started_at),
      suspended_since:     suspension.map(|p| p.started_at),
      injured_since:       injury.map(|p| p.started_at),
      employed_since:      employment.map(|p| p.started_at),
      previously_employed: previously,
    })
  }

  pub async fn snapshot(
    &self,
    id: Uuid,
  ) -> Result<(Entity, StatusSnapshot), S::Error> {
    let entity = self.entity(id).await?;
    let snap = self.snapshot_of(&entity).await?;
    Ok((entity, snap))
  }

  /// Current derived status, computed from the periods — never the cache.
  pub async fn status_of(&self, id: Uuid) -> Result<DerivedStatus, S::Error> {
    let (_, snap) = self.snapshot(id).await?;
    Ok(project(&snap, self.clock.now()))
  }

  /// Re-project and persist the cached status column.
  pub async fn refresh_status(
    &self,
    id: Uuid,
  ) -> Result<DerivedStatus, S::Error> {
    let status = self.status_of(id).await?;
    self.store.set_status(id, status).await.map_err(Error::Store)?;
    Ok(status)
  }

  /// Days the current period of this kind has run; `None` if nothing open.
  pub async fn current_period_duration(
    &self,
    id: Uuid,
    kind: PeriodKind,
  ) -> Result<Option<i64>, S::Error> {
    let current =
      self.store.current_period(id, kind).await.map_err(Error::Store)?;
    Ok(current.map(|p| p.duration_days(self.clock.now())))
  }

  // ── Composite planning ────────────────────────────────────────────────

  /// Plan closing every open membership the entity holds.
  pub(crate) async fn plan_detach_memberships(
    &self,
    entity: &Entity,
    at: DateTime<Utc>,
    ops: &mut Vec<PeriodOp>,
  ) -> Result<(), S::Error> {
    for kind in MembershipKind::ALL {
      let open = self
        .store
        .current_memberships(entity.entity_id, kind)
        .await
        .map_err(Error::Store)?;
      for p in open {
        ops.push(PeriodOp::Close {
          owner_id: entity.entity_id,
          kind:     PeriodKind::Membership(kind),
          group_id: p.group_id,
          ended_at: at,
        });
      }
    }
    Ok(())
  }

  /// Retirement composite: close the contract and any suspension or
  /// injury, sever memberships, open retirement, cache the status. The
  /// sequence is fixed; callers rely on it.
  pub(crate) async fn plan_retirement_of(
    &self,
    entity: &Entity,
    snap: &mut StatusSnapshot,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
    ops: &mut Vec<PeriodOp>,
  ) -> Result<(), S::Error> {
    plan_close(entity, snap, entity.kind.employment_kind(), at, ops)?;
    plan_close(entity, snap, PeriodKind::Suspension, at, ops)?;
    plan_close(entity, snap, PeriodKind::Injury, at, ops)?;
    self.plan_detach_memberships(entity, at, ops).await?;
    plan_open(entity, snap, PeriodKind::Retirement, at, ops);
    plan_status(entity, snap, now, ops);
    Ok(())
  }

  /// Release composite: clear suspension/injury, sever memberships, close
  /// the contract, cache the status.
  pub(crate) async fn plan_release_of(
    &self,
    entity: &Entity,
    snap: &mut StatusSnapshot,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
    ops: &mut Vec<PeriodOp>,
  ) -> Result<(), S::Error> {
    plan_close(entity, snap, PeriodKind::Suspension, at, ops)?;
    plan_close(entity, snap, PeriodKind::Injury, at, ops)?;
    self.plan_detach_memberships(entity, at, ops).await?;
    plan_close(entity, snap, entity.kind.employment_kind(), at, ops)?;
    plan_status(entity, snap, now, ops);
    Ok(())
  }

  // ── Single-kind operations ────────────────────────────────────────────

  async fn create_simple(
    &self,
    id: Uuid,
    kind: PeriodKind,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    let (entity, mut snap) = self.snapshot(id).await?;
    let mut ops = Vec::new();
    plan_open(&entity, &mut snap, kind, at, &mut ops);
    plan_status(&entity, &snap, self.clock.now(), &mut ops);
    self.store.apply(ops).await.map_err(Error::Store)?;
    self.entity(id).await
  }

  /// Close the open period of `kind` if there is one; a no-op otherwise.
  async fn end_simple(
    &self,
    id: Uuid,
    kind: PeriodKind,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    let (entity, mut snap) = self.snapshot(id).await?;
    let mut ops = Vec::new();
    if plan_close(&entity, &mut snap, kind, at, &mut ops)? {
      plan_status(&entity, &snap, self.clock.now(), &mut ops);
      self.store.apply(ops).await.map_err(Error::Store)?;
    }
    self.entity(id).await
  }

  pub async fn create_employment(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.create_simple(id, PeriodKind::Employment, at).await
  }

  pub async fn end_employment(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.end_simple(id, PeriodKind::Employment, at).await
  }

  pub async fn create_suspension(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.create_simple(id, PeriodKind::Suspension, at).await
  }

  pub async fn end_suspension(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.end_simple(id, PeriodKind::Suspension, at).await
  }

  pub async fn create_injury(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.create_simple(id, PeriodKind::Injury, at).await
  }

  pub async fn end_injury(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.end_simple(id, PeriodKind::Injury, at).await
  }

  pub async fn create_activation(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.create_simple(id, PeriodKind::Activation, at).await
  }

  pub async fn end_activation(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.end_simple(id, PeriodKind::Activation, at).await
  }

  /// The full retirement composite as one transaction. Cascading to a
  /// group's members is the action layer's job.
  pub async fn create_retirement(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    let (entity, mut snap) = self.snapshot(id).await?;
    let mut ops = Vec::new();
    self
      .plan_retirement_of(&entity, &mut snap, at, self.clock.now(), &mut ops)
      .await?;
    self.store.apply(ops).await.map_err(Error::Store)?;
    self.entity(id).await
  }

  pub async fn end_retirement(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    self.end_simple(id, PeriodKind::Retirement, at).await
  }

  // ── Memberships ───────────────────────────────────────────────────────

  /// Join `member` to `group`. For exclusive kinds an existing membership
  /// to a different group is closed at `at` in the same transaction;
  /// joining the current group again is an error.
  pub async fn add_member(
    &self,
    group_id: Uuid,
    member_id: Uuid,
    kind: MembershipKind,
    at: DateTime<Utc>,
  ) -> Result<Entity, S::Error> {
    let group = self.entity(group_id).await?;
    if group.kind != kind.group_kind() {
      return Err(
        CoreError::GroupKindMismatch { group_id, expected: kind.group_kind() }
          .into(),
      );
    }
    let member = self.entity(member_id).await?;

    let current = self
      .store
      .current_memberships(member_id, kind)
      .await
      .map_err(Error::Store)?;
    if current.iter().any(|p| p.group_id == Some(group_id)) {
      return Err(
        CoreError::DuplicateOpenPeriod {
          owner_id: member_id,
          kind:     PeriodKind::Membership(kind),
        }
        .into(),
      );
    }

    let mut ops = Vec::new();
    if kind.exclusive() {
      for p in &current {
        ops.push(PeriodOp::Close {
          owner_id: member_id,
          kind:     PeriodKind::Membership(kind),
          group_id: p.group_id,
          ended_at: at,
        });
      }
    }
    ops.push(PeriodOp::Open(NewPeriod::membership(
      &member, kind, group_id, at,
    )));
    self.store.apply(ops).await.map_err(Error::Store)?;
    Ok(member)
  }

  /// Close the member's open membership to `group`. Returns `false` — not
  /// an error — if none was open.
  pub async fn remove_member(
    &self,
    group_id: Uuid,
    member_id: Uuid,
    kind: MembershipKind,
    at: DateTime<Utc>,
  ) -> Result<bool, S::Error> {
    self
      .store
      .close_period(member_id, PeriodKind::Membership(kind), Some(group_id), at)
      .await
      .map_err(Error::Store)
  }

  pub async fn current_members(
    &self,
    group_id: Uuid,
    kind: MembershipKind,
  ) -> Result<Vec<Entity>, S::Error> {
    self.store.current_members(group_id, kind).await.map_err(Error::Store)
  }

  pub async fn previous_members(
    &self,
    group_id: Uuid,
    kind: MembershipKind,
  ) -> Result<Vec<Entity>, S::Error> {
    self.store.previous_members(group_id, kind).await.map_err(Error::Store)
  }

  /// The member's open membership periods of this kind.
  pub async fn current_memberships(
    &self,
    member_id: Uuid,
    kind: MembershipKind,
  ) -> Result<Vec<Period>, S::Error> {
    self
      .store
      .current_memberships(member_id, kind)
      .await
      .map_err(Error::Store)
  }
}
