//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings, which makes their
//! lexicographic order agree with their temporal order. UUIDs are stored as
//! hyphenated lowercase strings; kinds and statuses as their lowercase
//! discriminants.

use chrono::{DateTime, Utc};
use tenure_core::{
  entity::{Entity, EntityKind},
  period::{Period, PeriodKind},
  status::DerivedStatus,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EntityKind ──────────────────────────────────────────────────────────────

pub fn encode_entity_kind(k: EntityKind) -> &'static str {
  match k {
    EntityKind::Wrestler => "wrestler",
    EntityKind::TagTeam => "tag_team",
    EntityKind::Manager => "manager",
    EntityKind::Stable => "stable",
    EntityKind::Title => "title",
  }
}

pub fn decode_entity_kind(s: &str) -> Result<EntityKind> {
  match s {
    "wrestler" => Ok(EntityKind::Wrestler),
    "tag_team" => Ok(EntityKind::TagTeam),
    "manager" => Ok(EntityKind::Manager),
    "stable" => Ok(EntityKind::Stable),
    "title" => Ok(EntityKind::Title),
    other => {
      Err(tenure_core::Error::UnknownEntityKind(other.to_owned()).into())
    }
  }
}

// ─── PeriodKind / DerivedStatus ──────────────────────────────────────────────

pub fn encode_period_kind(k: PeriodKind) -> &'static str { k.discriminant() }

pub fn decode_period_kind(s: &str) -> Result<PeriodKind> {
  Ok(PeriodKind::from_discriminant(s)?)
}

pub fn encode_status(s: DerivedStatus) -> &'static str { s.discriminant() }

pub fn decode_status(s: &str) -> Result<DerivedStatus> {
  Ok(DerivedStatus::from_discriminant(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:  String,
  pub kind:       String,
  pub status:     String,
  pub created_at: String,
}

impl RawEntity {
  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      entity_id:  decode_uuid(&self.entity_id)?,
      kind:       decode_entity_kind(&self.kind)?,
      status:     decode_status(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `periods` row.
pub struct RawPeriod {
  pub period_id:  String,
  pub owner_id:   String,
  pub owner_kind: String,
  pub kind:       String,
  pub group_id:   Option<String>,
  pub started_at: String,
  pub ended_at:   Option<String>,
}

impl RawPeriod {
  pub fn into_period(self) -> Result<Period> {
    Ok(Period {
      period_id:  decode_uuid(&self.period_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      owner_kind: decode_entity_kind(&self.owner_kind)?,
      kind:       decode_period_kind(&self.kind)?,
      group_id:   self.group_id.as_deref().map(decode_uuid).transpose()?,
      started_at: decode_dt(&self.started_at)?,
      ended_at:   self.ended_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
