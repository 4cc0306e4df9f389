//! Error type for `tenure-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  /// Domain-rule violation — illegal transition, duplicate open period,
  /// missing entity.
  #[error(transparent)]
  Domain(#[from] tenure_core::Error),

  /// Failure surfaced by the backing store.
  #[error("store error: {0}")]
  Store(#[source] E),
}

pub type Result<T, E> = std::result::Result<T, Error<E>>;
