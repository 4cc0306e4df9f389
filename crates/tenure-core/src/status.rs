//! Derived status and the projection from open periods to a single label.
//!
//! The projection is a pure function of a [`StatusSnapshot`] — which period
//! kinds are currently open, plus two temporal facts — and never looks
//! anything up. The engine caches the result on the entity row after every
//! period mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─── DerivedStatus ───────────────────────────────────────────────────────────

/// The single lifecycle label for an entity, derived from its open periods.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
  #[default]
  Unemployed,
  /// An employment period exists but its start lies in the future.
  PendingEmployment,
  Employed,
  Released,
  Suspended,
  Injured,
  Retired,
}

impl DerivedStatus {
  /// The discriminant string stored in the entity `status` column.
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::Unemployed => "unemployed",
      Self::PendingEmployment => "pending_employment",
      Self::Employed => "employed",
      Self::Released => "released",
      Self::Suspended => "suspended",
      Self::Injured => "injured",
      Self::Retired => "retired",
    }
  }

  pub fn from_discriminant(s: &str) -> Result<Self> {
    match s {
      "unemployed" => Ok(Self::Unemployed),
      "pending_employment" => Ok(Self::PendingEmployment),
      "employed" => Ok(Self::Employed),
      "released" => Ok(Self::Released),
      "suspended" => Ok(Self::Suspended),
      "injured" => Ok(Self::Injured),
      "retired" => Ok(Self::Retired),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }

  /// Eligible for scheduling: employed with no open suspension, injury, or
  /// retirement period.
  pub fn is_bookable(self) -> bool { matches!(self, Self::Employed) }
}

// ─── StatusSnapshot ──────────────────────────────────────────────────────────

/// The open-period facts projection runs on. Start timestamps are carried so
/// the engine can also reject end-before-start writes without a second read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
  pub retired_since:       Option<DateTime<Utc>>,
  pub suspended_since:     Option<DateTime<Utc>>,
  pub injured_since:       Option<DateTime<Utc>>,
  /// Start of the open employment period (activation run, for titles).
  pub employed_since:      Option<DateTime<Utc>>,
  /// Whether any closed employment period exists — distinguishes Released
  /// from Unemployed once nothing is open.
  pub previously_employed: bool,
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Map a snapshot to the one status label that surfaces. Precedence when
/// several kinds are open: Retired > Suspended > Injured > Employed.
///
/// Pure and total: same snapshot and `now` always yield the same status.
pub fn project(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> DerivedStatus {
  if snapshot.retired_since.is_some() {
    return DerivedStatus::Retired;
  }
  if snapshot.suspended_since.is_some() {
    return DerivedStatus::Suspended;
  }
  if snapshot.injured_since.is_some() {
    return DerivedStatus::Injured;
  }
  if let Some(since) = snapshot.employed_since {
    return if since > now {
      DerivedStatus::PendingEmployment
    } else {
      DerivedStatus::Employed
    };
  }
  if snapshot.previously_employed {
    DerivedStatus::Released
  } else {
    DerivedStatus::Unemployed
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
  }

  #[test]
  fn empty_snapshot_is_unemployed() {
    let status = project(&StatusSnapshot::default(), at(2024, 1, 1));
    assert_eq!(status, DerivedStatus::Unemployed);
  }

  #[test]
  fn closed_employment_history_means_released() {
    let snap = StatusSnapshot {
      previously_employed: true,
      ..Default::default()
    };
    assert_eq!(project(&snap, at(2024, 1, 1)), DerivedStatus::Released);
  }

  #[test]
  fn open_employment_is_employed_and_bookable() {
    let snap = StatusSnapshot {
      employed_since: Some(at(2024, 1, 1)),
      ..Default::default()
    };
    let status = project(&snap, at(2024, 6, 1));
    assert_eq!(status, DerivedStatus::Employed);
    assert!(status.is_bookable());
  }

  #[test]
  fn future_employment_start_is_pending() {
    let snap = StatusSnapshot {
      employed_since: Some(at(2024, 6, 1)),
      ..Default::default()
    };
    assert_eq!(
      project(&snap, at(2024, 1, 1)),
      DerivedStatus::PendingEmployment
    );
  }

  #[test]
  fn employment_starting_exactly_now_is_employed() {
    let snap = StatusSnapshot {
      employed_since: Some(at(2024, 1, 1)),
      ..Default::default()
    };
    assert_eq!(project(&snap, at(2024, 1, 1)), DerivedStatus::Employed);
  }

  #[test]
  fn precedence_retired_beats_everything() {
    let snap = StatusSnapshot {
      retired_since:       Some(at(2024, 4, 1)),
      suspended_since:     Some(at(2024, 2, 1)),
      injured_since:       Some(at(2024, 3, 1)),
      employed_since:      Some(at(2024, 1, 1)),
      previously_employed: true,
    };
    assert_eq!(project(&snap, at(2024, 6, 1)), DerivedStatus::Retired);
  }

  #[test]
  fn precedence_suspended_beats_injured_and_employed() {
    let snap = StatusSnapshot {
      suspended_since: Some(at(2024, 2, 1)),
      injured_since:   Some(at(2024, 3, 1)),
      employed_since:  Some(at(2024, 1, 1)),
      ..Default::default()
    };
    let status = project(&snap, at(2024, 6, 1));
    assert_eq!(status, DerivedStatus::Suspended);
    assert!(!status.is_bookable());
  }

  #[test]
  fn projection_is_deterministic() {
    let snap = StatusSnapshot {
      injured_since:  Some(at(2024, 3, 1)),
      employed_since: Some(at(2024, 1, 1)),
      ..Default::default()
    };
    let now = at(2024, 6, 1);
    assert_eq!(project(&snap, now), project(&snap, now));
  }
}
