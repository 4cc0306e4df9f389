//! The `PeriodStore` trait and the atomic write-batch type.
//!
//! The trait is implemented by storage backends (e.g.
//! `tenure-store-sqlite`). The engine crate depends on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  entity::{Entity, EntityKind},
  period::{MembershipKind, NewPeriod, Period, PeriodKind},
  status::DerivedStatus,
};

// ─── Write batch ─────────────────────────────────────────────────────────────

/// One mutation inside an atomic batch passed to [`PeriodStore::apply`].
/// A composite transition ("close the old contract, open retirement, cache
/// the new status") is a sequence of these committed together.
#[derive(Debug, Clone)]
pub enum PeriodOp {
  /// Open a new period; fails the batch if one of the same
  /// (owner, kind, group) is already open.
  Open(NewPeriod),
  /// Close the open period matching (owner, kind, group), if any.
  /// Closing nothing is not an error.
  Close {
    owner_id: Uuid,
    kind:     PeriodKind,
    group_id: Option<Uuid>,
    ended_at: DateTime<Utc>,
  },
  /// Rewrite the cached status column on the entity row.
  SetStatus {
    entity_id: Uuid,
    status:    DerivedStatus,
  },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a tenure period store backend.
///
/// Periods are append-then-close: a row is inserted open and the only
/// mutation it ever receives is its `ended_at` being set. The store — not
/// caller discipline — enforces that at most one period per
/// (owner, kind, group) is open at a time.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait PeriodStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Create and persist a new entity of the given kind, starting
  /// unemployed.
  fn add_entity(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Create and persist an entity with a caller-supplied UUID.
  /// Returns an error if the UUID is already taken.
  fn add_entity_with_id(
    &self,
    id: Uuid,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Retrieve an entity by UUID. Returns `None` if not found.
  fn get_entity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// List all entities, optionally filtered by kind.
  fn list_entities(
    &self,
    kind: Option<EntityKind>,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + '_;

  /// Rewrite the cached status column. Errors if the entity is missing.
  fn set_status(
    &self,
    id: Uuid,
    status: DerivedStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Periods ───────────────────────────────────────────────────────────

  /// Insert a new open period. Fails if an open period of the same
  /// (owner, kind, group) already exists.
  fn open_period(
    &self,
    input: NewPeriod,
  ) -> impl Future<Output = Result<Period, Self::Error>> + Send + '_;

  /// Set `ended_at` on the open period matching (owner, kind, group).
  /// Returns `false` — a no-op, not an error — if none is open.
  fn close_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
    group_id: Option<Uuid>,
    ended_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn has_open_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The open period of this kind, if any.
  fn current_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> impl Future<Output = Result<Option<Period>, Self::Error>> + Send + '_;

  /// The most recently closed period of this kind, if any.
  fn previous_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> impl Future<Output = Result<Option<Period>, Self::Error>> + Send + '_;

  /// All periods of this kind, ascending by `started_at`.
  fn periods(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> impl Future<Output = Result<Vec<Period>, Self::Error>> + Send + '_;

  // ── Memberships ───────────────────────────────────────────────────────

  /// All open membership periods of this kind owned by `member_id`.
  /// More than one is possible only for non-exclusive kinds.
  fn current_memberships(
    &self,
    member_id: Uuid,
    kind: MembershipKind,
  ) -> impl Future<Output = Result<Vec<Period>, Self::Error>> + Send + '_;

  /// Entities holding an open membership of this kind to `group_id`,
  /// ordered by join time.
  fn current_members(
    &self,
    group_id: Uuid,
    kind: MembershipKind,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + '_;

  /// Entities whose membership of this kind to `group_id` has ended and
  /// who hold no open one.
  fn previous_members(
    &self,
    group_id: Uuid,
    kind: MembershipKind,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + '_;

  // ── Atomic batches ────────────────────────────────────────────────────

  /// Execute every op in one transaction. Any failure — including a
  /// duplicate open period or a missing entity — rolls back the whole
  /// batch.
  fn apply(
    &self,
    ops: Vec<PeriodOp>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
