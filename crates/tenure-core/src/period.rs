//! Period types — the fundamental unit of the tenure store.
//!
//! A period is a time-bounded interval attached to one owner entity: a
//! contract, a suspension, an injury, a retirement, a title activation, or
//! a group membership. A period with no end timestamp is "open"; at most
//! one period per (owner, kind, group) may be open at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::{Entity, EntityKind},
  error::{Error, Result},
};

// ─── Membership kinds ────────────────────────────────────────────────────────

/// The temporal many-to-many relations: wrestler↔tag-team, member↔stable,
/// wrestler↔manager. The member side owns the period; `group_id` points at
/// the other party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
  TagTeam,
  Stable,
  Management,
}

impl MembershipKind {
  /// Severance order for composite transitions: management links first,
  /// then tag team, then stable.
  pub const ALL: [Self; 3] = [Self::Management, Self::TagTeam, Self::Stable];

  /// Whether a member may hold only one open membership of this kind at a
  /// time. Management is the exception: several managers may share a client.
  pub fn exclusive(self) -> bool { !matches!(self, Self::Management) }

  /// The entity kind expected on the group side of the relation.
  pub fn group_kind(self) -> EntityKind {
    match self {
      Self::TagTeam => EntityKind::TagTeam,
      Self::Stable => EntityKind::Stable,
      Self::Management => EntityKind::Manager,
    }
  }
}

// ─── Period kinds ────────────────────────────────────────────────────────────

/// The lifecycle dimension a period tracks. The discriminant string is what
/// the database stores in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
  Employment,
  Suspension,
  Injury,
  Retirement,
  Activation,
  Membership(MembershipKind),
}

impl PeriodKind {
  /// The discriminant string stored in the `kind` column.
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::Employment => "employment",
      Self::Suspension => "suspension",
      Self::Injury => "injury",
      Self::Retirement => "retirement",
      Self::Activation => "activation",
      Self::Membership(MembershipKind::TagTeam) => "membership_tag_team",
      Self::Membership(MembershipKind::Stable) => "membership_stable",
      Self::Membership(MembershipKind::Management) => "membership_management",
    }
  }

  /// Inverse of [`discriminant`](Self::discriminant).
  pub fn from_discriminant(s: &str) -> Result<Self> {
    match s {
      "employment" => Ok(Self::Employment),
      "suspension" => Ok(Self::Suspension),
      "injury" => Ok(Self::Injury),
      "retirement" => Ok(Self::Retirement),
      "activation" => Ok(Self::Activation),
      "membership_tag_team" => Ok(Self::Membership(MembershipKind::TagTeam)),
      "membership_stable" => Ok(Self::Membership(MembershipKind::Stable)),
      "membership_management" => {
        Ok(Self::Membership(MembershipKind::Management))
      }
      other => Err(Error::UnknownPeriodKind(other.to_owned())),
    }
  }
}

// ─── Period ──────────────────────────────────────────────────────────────────

/// One time-bounded interval owned by an entity. Created open; the only
/// mutation it ever sees is the store setting `ended_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
  pub period_id:  Uuid,
  pub owner_id:   Uuid,
  pub owner_kind: EntityKind,
  pub kind:       PeriodKind,
  /// The other party for membership periods; `None` for all other kinds.
  pub group_id:   Option<Uuid>,
  pub started_at: DateTime<Utc>,
  pub ended_at:   Option<DateTime<Utc>>,
}

impl Period {
  pub fn is_open(&self) -> bool { self.ended_at.is_none() }

  /// Whole days covered by this period, measured to `now` while still open.
  pub fn duration_days(&self, now: DateTime<Utc>) -> i64 {
    (self.ended_at.unwrap_or(now) - self.started_at).num_days()
  }
}

// ─── NewPeriod ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::PeriodStore::open_period`].
/// The `period_id` is always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPeriod {
  pub owner_id:   Uuid,
  pub owner_kind: EntityKind,
  pub kind:       PeriodKind,
  pub group_id:   Option<Uuid>,
  pub started_at: DateTime<Utc>,
}

impl NewPeriod {
  pub fn new(owner: &Entity, kind: PeriodKind, at: DateTime<Utc>) -> Self {
    Self {
      owner_id: owner.entity_id,
      owner_kind: owner.kind,
      kind,
      group_id: None,
      started_at: at,
    }
  }

  /// A membership period: `member` joins `group_id` at `at`.
  pub fn membership(
    member: &Entity,
    kind: MembershipKind,
    group_id: Uuid,
    at: DateTime<Utc>,
  ) -> Self {
    Self {
      owner_id: member.entity_id,
      owner_kind: member.kind,
      kind: PeriodKind::Membership(kind),
      group_id: Some(group_id),
      started_at: at,
    }
  }
}
