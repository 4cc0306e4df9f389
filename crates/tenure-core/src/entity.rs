//! Entity — the thin envelope that owns periods.
//!
//! An entity holds identity metadata plus a cached copy of its derived
//! status. The status column is a read optimisation only; the periods are
//! always the authority, and the cache is rewritten synchronously on every
//! period mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{period::PeriodKind, status::DerivedStatus};

/// The kind of roster entity an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Wrestler,
  TagTeam,
  Manager,
  Stable,
  Title,
}

impl EntityKind {
  /// The period kind that fills the "employment" slot for this entity.
  /// Titles track activation runs instead of contracts.
  pub fn employment_kind(self) -> PeriodKind {
    match self {
      Self::Title => PeriodKind::Activation,
      _ => PeriodKind::Employment,
    }
  }
}

/// A roster entity: a UUID, its kind, and the cached derived status.
/// Everything temporal about the entity lives in its periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:  Uuid,
  pub kind:       EntityKind,
  pub status:     DerivedStatus,
  pub created_at: DateTime<Utc>,
}
