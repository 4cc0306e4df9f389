//! Error types for `tenure-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{period::PeriodKind, status::DerivedStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  #[error("entity {owner_id} already has an open {kind:?} period")]
  DuplicateOpenPeriod { owner_id: Uuid, kind: PeriodKind },

  #[error("cannot {action} an entity whose status is {status:?}")]
  CannotTransition {
    action: &'static str,
    status: DerivedStatus,
  },

  /// Closing a period at a timestamp earlier than its start is a
  /// data-quality bug; the business layer rejects it up front.
  #[error("period for entity {owner_id} cannot end before it starts")]
  PeriodEndsBeforeStart { owner_id: Uuid },

  #[error("entity {group_id} is not a {expected:?}")]
  GroupKindMismatch {
    group_id: Uuid,
    expected: crate::entity::EntityKind,
  },

  #[error("unknown entity kind discriminant: {0:?}")]
  UnknownEntityKind(String),

  #[error("unknown period kind discriminant: {0:?}")]
  UnknownPeriodKind(String),

  #[error("unknown status discriminant: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
