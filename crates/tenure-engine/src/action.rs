//! [`LifecycleActions`] — validated lifecycle transitions with cascades.
//!
//! Each action is a state-machine edge over the derived status. Calling an
//! action from a status outside its table is a hard error, never a no-op;
//! double transitions must be rejected loudly.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tenure_core::{
  Error as CoreError,
  clock::Clock,
  entity::Entity,
  period::PeriodKind,
  status::{DerivedStatus, StatusSnapshot, project},
  store::{PeriodOp, PeriodStore},
};

use crate::{
  cascade::{CascadeEffect, CascadePolicy},
  error::{Error, Result},
  repository::{self, LifecycleRepository},
};

// ─── ActionKind ──────────────────────────────────────────────────────────────

/// The eight lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
  Employ,
  Release,
  Suspend,
  Reinstate,
  Injure,
  Heal,
  Retire,
  Unretire,
}

impl ActionKind {
  pub fn name(self) -> &'static str {
    match self {
      Self::Employ => "employ",
      Self::Release => "release",
      Self::Suspend => "suspend",
      Self::Reinstate => "reinstate",
      Self::Injure => "injure",
      Self::Heal => "heal",
      Self::Retire => "retire",
      Self::Unretire => "unretire",
    }
  }

  /// The transition table: which derived statuses each action accepts.
  pub fn permitted_from(self, status: DerivedStatus) -> bool {
    use DerivedStatus::*;
    match self {
      Self::Employ => matches!(status, Unemployed | Released | Retired),
      Self::Release => matches!(status, Employed | Suspended | Injured),
      // Suspending or injuring requires the entity to be bookable.
      Self::Suspend | Self::Injure => matches!(status, Employed),
      Self::Reinstate => matches!(status, Suspended),
      Self::Heal => matches!(status, Injured),
      Self::Retire => {
        matches!(status, Employed | Suspended | Injured | Released)
      }
      Self::Unretire => matches!(status, Retired),
    }
  }
}

// ─── LifecycleActions ────────────────────────────────────────────────────────

pub struct LifecycleActions<S, C> {
  repo:     LifecycleRepository<S, C>,
  cascades: CascadePolicy,
}

impl<S: PeriodStore, C: Clock> LifecycleActions<S, C> {
  pub fn new(repo: LifecycleRepository<S, C>) -> Self {
    Self { repo, cascades: CascadePolicy::standard() }
  }

  pub fn with_cascades(
    repo: LifecycleRepository<S, C>,
    cascades: CascadePolicy,
  ) -> Self {
    Self { repo, cascades }
  }

  pub fn repository(&self) -> &LifecycleRepository<S, C> { &self.repo }

  // ── Public actions ────────────────────────────────────────────────────
  // `at` defaults to the clock's now.

  pub async fn employ(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Employ, at).await
  }

  pub async fn release(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Release, at).await
  }

  pub async fn suspend(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Suspend, at).await
  }

  pub async fn reinstate(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Reinstate, at).await
  }

  pub async fn injure(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Injure, at).await
  }

  pub async fn heal(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Heal, at).await
  }

  pub async fn retire(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Retire, at).await
  }

  pub async fn unretire(
    &self,
    id: Uuid,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    self.run(id, ActionKind::Unretire, at).await
  }

  // ── Execution ─────────────────────────────────────────────────────────

  /// Validate and plan the transition for the root entity plus everything
  /// the cascade policy pulls in, then commit the whole batch atomically.
  /// A violation anywhere — root or cascaded member — writes nothing.
  async fn run(
    &self,
    id: Uuid,
    action: ActionKind,
    at: Option<DateTime<Utc>>,
  ) -> Result<Entity, S::Error> {
    let now = self.repo.clock().now();
    let at = at.unwrap_or(now);

    let mut ops: Vec<PeriodOp> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut queue: VecDeque<(Uuid, ActionKind)> = VecDeque::new();
    queue.push_back((id, action));

    while let Some((entity_id, act)) = queue.pop_front() {
      // An entity reachable through more than one cascade path is planned
      // once.
      if !seen.insert(entity_id) {
        continue;
      }

      let (entity, mut snap) = self.repo.snapshot(entity_id).await?;
      let status = project(&snap, now);
      if !act.permitted_from(status) {
        return Err(
          CoreError::CannotTransition { action: act.name(), status }.into(),
        );
      }
      tracing::debug!(
        entity = %entity_id,
        action = act.name(),
        from = status.discriminant(),
        "planning transition"
      );

      self.plan(&entity, &mut snap, act, at, now, &mut ops).await?;

      for rule in self.cascades.rules_for(entity.kind, act) {
        let members = self
          .repo
          .store()
          .current_members(entity_id, rule.membership)
          .await
          .map_err(Error::Store)?;
        if members.is_empty() {
          continue;
        }
        tracing::info!(
          group = %entity_id,
          action = act.name(),
          members = members.len(),
          "cascading to current members"
        );
        match rule.effect {
          CascadeEffect::Propagate(sub) => {
            for member in &members {
              queue.push_back((member.entity_id, sub));
            }
          }
          CascadeEffect::Detach => {
            for member in &members {
              ops.push(PeriodOp::Close {
                owner_id: member.entity_id,
                kind:     PeriodKind::Membership(rule.membership),
                group_id: Some(entity_id),
                ended_at: at,
              });
            }
          }
        }
      }
    }

    self.repo.store().apply(ops).await.map_err(Error::Store)?;
    self.repo.entity(id).await
  }

  /// Plan one entity's own period mutations for `action`.
  async fn plan(
    &self,
    entity: &Entity,
    snap: &mut StatusSnapshot,
    action: ActionKind,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
    ops: &mut Vec<PeriodOp>,
  ) -> Result<(), S::Error> {
    match action {
      ActionKind::Employ => {
        repository::plan_close(entity, snap, PeriodKind::Retirement, at, ops)?;
        repository::plan_open(
          entity,
          snap,
          entity.kind.employment_kind(),
          at,
          ops,
        );
        repository::plan_status(entity, snap, now, ops);
      }
      ActionKind::Release => {
        self.repo.plan_release_of(entity, snap, at, now, ops).await?;
      }
      ActionKind::Suspend => {
        repository::plan_open(entity, snap, PeriodKind::Suspension, at, ops);
        repository::plan_status(entity, snap, now, ops);
      }
      ActionKind::Reinstate => {
        repository::plan_close(entity, snap, PeriodKind::Suspension, at, ops)?;
        repository::plan_status(entity, snap, now, ops);
      }
      ActionKind::Injure => {
        repository::plan_open(entity, snap, PeriodKind::Injury, at, ops);
        repository::plan_status(entity, snap, now, ops);
      }
      ActionKind::Heal => {
        repository::plan_close(entity, snap, PeriodKind::Injury, at, ops)?;
        repository::plan_status(entity, snap, now, ops);
      }
      ActionKind::Retire => {
        self.repo.plan_retirement_of(entity, snap, at, now, ops).await?;
      }
      ActionKind::Unretire => {
        repository::plan_close(entity, snap, PeriodKind::Retirement, at, ops)?;
        // Projection lands on Released; a fresh employ is needed to book
        // again.
        repository::plan_status(entity, snap, now, ops);
      }
    }
    Ok(())
  }
}
