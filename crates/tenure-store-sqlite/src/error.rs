//! Error type for `tenure-store-sqlite`.

use tenure_core::period::PeriodKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tenure_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  /// An open period of this kind already exists for the owner.
  #[error("entity {owner_id} already has an open {kind:?} period")]
  DuplicateOpenPeriod { owner_id: Uuid, kind: PeriodKind },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
