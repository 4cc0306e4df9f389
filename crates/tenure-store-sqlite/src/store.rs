//! [`SqliteStore`] — the SQLite implementation of [`PeriodStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tenure_core::{
  entity::{Entity, EntityKind},
  period::{MembershipKind, NewPeriod, Period, PeriodKind},
  status::DerivedStatus,
  store::{PeriodOp, PeriodStore},
};

use crate::{
  Error, Result,
  encode::{
    RawEntity, RawPeriod, encode_dt, encode_entity_kind, encode_period_kind,
    encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Shared SQL ──────────────────────────────────────────────────────────────

const SQL_ENTITY_EXISTS: &str = "SELECT 1 FROM entities WHERE entity_id = ?1";

const SQL_OPEN_EXISTS: &str = "SELECT 1 FROM periods
   WHERE owner_id = ?1 AND kind = ?2
     AND COALESCE(group_id, '') = ?3 AND ended_at IS NULL";

const SQL_INSERT_PERIOD: &str = "INSERT INTO periods
     (period_id, owner_id, owner_kind, kind, group_id, started_at, ended_at)
   VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)";

const SQL_CLOSE_PERIOD: &str = "UPDATE periods SET ended_at = ?1
   WHERE owner_id = ?2 AND kind = ?3
     AND COALESCE(group_id, '') = ?4 AND ended_at IS NULL";

/// Outcome of a guarded write closure. Domain errors are carried out of the
/// connection thread as data and raised after the transaction has rolled
/// back.
enum WriteOutcome {
  Done,
  MissingEntity(Uuid),
  DuplicateOpen { owner_id: Uuid, kind: PeriodKind },
}

fn period_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPeriod> {
  Ok(RawPeriod {
    period_id:  row.get(0)?,
    owner_id:   row.get(1)?,
    owner_kind: row.get(2)?,
    kind:       row.get(3)?,
    group_id:   row.get(4)?,
    started_at: row.get(5)?,
    ended_at:   row.get(6)?,
  })
}

fn entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntity> {
  Ok(RawEntity {
    entity_id:  row.get(0)?,
    kind:       row.get(1)?,
    status:     row.get(2)?,
    created_at: row.get(3)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tenure period store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn insert_entity(&self, entity: &Entity) -> Result<()> {
    let id_str     = encode_uuid(entity.entity_id);
    let kind_str   = encode_entity_kind(entity.kind).to_owned();
    let status_str = encode_status(entity.status).to_owned();
    let at_str     = encode_dt(entity.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entities (entity_id, kind, status, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, kind_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_one_period(
    &self,
    sql: &'static str,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> Result<Option<Period>> {
    let owner_str = encode_uuid(owner_id);
    let kind_str  = encode_period_kind(kind).to_owned();

    let raw: Option<RawPeriod> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![owner_str, kind_str], period_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPeriod::into_period).transpose()
  }
}

/// Run one [`PeriodOp`] against an open transaction. An `Err` or a
/// non-[`WriteOutcome::Done`] return aborts the batch.
fn run_op(
  tx: &rusqlite::Transaction<'_>,
  op: &PeriodOp,
) -> std::result::Result<WriteOutcome, rusqlite::Error> {
  match op {
    PeriodOp::Open(input) => {
      let owner_str = encode_uuid(input.owner_id);
      let kind_str  = encode_period_kind(input.kind);
      let group_str =
        input.group_id.map(encode_uuid).unwrap_or_default();

      let exists: bool = tx
        .query_row(SQL_ENTITY_EXISTS, rusqlite::params![owner_str], |_| {
          Ok(true)
        })
        .optional()?
        .unwrap_or(false);
      if !exists {
        return Ok(WriteOutcome::MissingEntity(input.owner_id));
      }

      let open: bool = tx
        .query_row(
          SQL_OPEN_EXISTS,
          rusqlite::params![owner_str, kind_str, group_str],
          |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
      if open {
        return Ok(WriteOutcome::DuplicateOpen {
          owner_id: input.owner_id,
          kind:     input.kind,
        });
      }

      tx.execute(
        SQL_INSERT_PERIOD,
        rusqlite::params![
          encode_uuid(Uuid::new_v4()),
          owner_str,
          encode_entity_kind(input.owner_kind),
          kind_str,
          input.group_id.map(encode_uuid),
          encode_dt(input.started_at),
        ],
      )?;
    }

    PeriodOp::Close { owner_id, kind, group_id, ended_at } => {
      tx.execute(
        SQL_CLOSE_PERIOD,
        rusqlite::params![
          encode_dt(*ended_at),
          encode_uuid(*owner_id),
          encode_period_kind(*kind),
          group_id.map(encode_uuid).unwrap_or_default(),
        ],
      )?;
    }

    PeriodOp::SetStatus { entity_id, status } => {
      let changed = tx.execute(
        "UPDATE entities SET status = ?1 WHERE entity_id = ?2",
        rusqlite::params![encode_status(*status), encode_uuid(*entity_id)],
      )?;
      if changed == 0 {
        return Ok(WriteOutcome::MissingEntity(*entity_id));
      }
    }
  }
  Ok(WriteOutcome::Done)
}

fn raise(outcome: WriteOutcome) -> Result<()> {
  match outcome {
    WriteOutcome::Done => Ok(()),
    WriteOutcome::MissingEntity(id) => Err(Error::EntityNotFound(id)),
    WriteOutcome::DuplicateOpen { owner_id, kind } => {
      Err(Error::DuplicateOpenPeriod { owner_id, kind })
    }
  }
}

// ─── PeriodStore impl ────────────────────────────────────────────────────────

impl PeriodStore for SqliteStore {
  type Error = Error;

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn add_entity(&self, kind: EntityKind) -> Result<Entity> {
    self.add_entity_with_id(Uuid::new_v4(), kind).await
  }

  async fn add_entity_with_id(
    &self,
    id: Uuid,
    kind: EntityKind,
  ) -> Result<Entity> {
    let entity = Entity {
      entity_id:  id,
      kind,
      status:     DerivedStatus::Unemployed,
      created_at: Utc::now(),
    };
    self.insert_entity(&entity).await?;
    Ok(entity)
  }

  async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT entity_id, kind, status, created_at FROM entities
               WHERE entity_id = ?1",
              rusqlite::params![id_str],
              entity_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn list_entities(
    &self,
    kind: Option<EntityKind>,
  ) -> Result<Vec<Entity>> {
    let kind_str = kind.map(encode_entity_kind).map(str::to_owned);

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(k) = kind_str {
          let mut stmt = conn.prepare(
            "SELECT entity_id, kind, status, created_at FROM entities
             WHERE kind = ?1 ORDER BY created_at",
          )?;
          stmt
            .query_map(rusqlite::params![k], entity_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT entity_id, kind, status, created_at FROM entities
             ORDER BY created_at",
          )?;
          stmt
            .query_map([], entity_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  async fn set_status(&self, id: Uuid, status: DerivedStatus) -> Result<()> {
    let id_str     = encode_uuid(id);
    let status_str = encode_status(status).to_owned();

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE entities SET status = ?1 WHERE entity_id = ?2",
          rusqlite::params![status_str, id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::EntityNotFound(id));
    }
    Ok(())
  }

  // ── Periods ───────────────────────────────────────────────────────────────

  async fn open_period(&self, input: NewPeriod) -> Result<Period> {
    let period = Period {
      period_id:  Uuid::new_v4(),
      owner_id:   input.owner_id,
      owner_kind: input.owner_kind,
      kind:       input.kind,
      group_id:   input.group_id,
      started_at: input.started_at,
      ended_at:   None,
    };

    let owner_id      = period.owner_id;
    let kind          = period.kind;
    let period_id_str = encode_uuid(period.period_id);
    let owner_str     = encode_uuid(owner_id);
    let owner_kind    = encode_entity_kind(period.owner_kind).to_owned();
    let kind_str      = encode_period_kind(kind).to_owned();
    let group_str_opt = period.group_id.map(encode_uuid);
    let started_str   = encode_dt(period.started_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(SQL_ENTITY_EXISTS, rusqlite::params![owner_str], |_| {
            Ok(true)
          })
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(WriteOutcome::MissingEntity(owner_id));
        }

        let open: bool = conn
          .query_row(
            SQL_OPEN_EXISTS,
            rusqlite::params![
              owner_str,
              kind_str,
              group_str_opt.clone().unwrap_or_default(),
            ],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if open {
          return Ok(WriteOutcome::DuplicateOpen { owner_id, kind });
        }

        conn.execute(
          SQL_INSERT_PERIOD,
          rusqlite::params![
            period_id_str,
            owner_str,
            owner_kind,
            kind_str,
            group_str_opt,
            started_str,
          ],
        )?;
        Ok(WriteOutcome::Done)
      })
      .await?;

    raise(outcome)?;
    Ok(period)
  }

  async fn close_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
    group_id: Option<Uuid>,
    ended_at: DateTime<Utc>,
  ) -> Result<bool> {
    let ended_str = encode_dt(ended_at);
    let owner_str = encode_uuid(owner_id);
    let kind_str  = encode_period_kind(kind).to_owned();
    let group_str = group_id.map(encode_uuid).unwrap_or_default();

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          SQL_CLOSE_PERIOD,
          rusqlite::params![ended_str, owner_str, kind_str, group_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn has_open_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> Result<bool> {
    let owner_str = encode_uuid(owner_id);
    let kind_str  = encode_period_kind(kind).to_owned();

    let open: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM periods
               WHERE owner_id = ?1 AND kind = ?2 AND ended_at IS NULL",
              rusqlite::params![owner_str, kind_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(open)
  }

  async fn current_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> Result<Option<Period>> {
    self
      .query_one_period(
        "SELECT period_id, owner_id, owner_kind, kind, group_id, started_at,
                ended_at
         FROM periods
         WHERE owner_id = ?1 AND kind = ?2 AND ended_at IS NULL
         ORDER BY started_at DESC LIMIT 1",
        owner_id,
        kind,
      )
      .await
  }

  async fn previous_period(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> Result<Option<Period>> {
    self
      .query_one_period(
        "SELECT period_id, owner_id, owner_kind, kind, group_id, started_at,
                ended_at
         FROM periods
         WHERE owner_id = ?1 AND kind = ?2 AND ended_at IS NOT NULL
         ORDER BY ended_at DESC LIMIT 1",
        owner_id,
        kind,
      )
      .await
  }

  async fn periods(
    &self,
    owner_id: Uuid,
    kind: PeriodKind,
  ) -> Result<Vec<Period>> {
    let owner_str = encode_uuid(owner_id);
    let kind_str  = encode_period_kind(kind).to_owned();

    let raws: Vec<RawPeriod> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT period_id, owner_id, owner_kind, kind, group_id,
                  started_at, ended_at
           FROM periods
           WHERE owner_id = ?1 AND kind = ?2
           ORDER BY started_at ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str, kind_str], period_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPeriod::into_period).collect()
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  async fn current_memberships(
    &self,
    member_id: Uuid,
    kind: MembershipKind,
  ) -> Result<Vec<Period>> {
    let member_str = encode_uuid(member_id);
    let kind_str =
      encode_period_kind(PeriodKind::Membership(kind)).to_owned();

    let raws: Vec<RawPeriod> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT period_id, owner_id, owner_kind, kind, group_id,
                  started_at, ended_at
           FROM periods
           WHERE owner_id = ?1 AND kind = ?2 AND ended_at IS NULL
           ORDER BY started_at ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![member_str, kind_str], period_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPeriod::into_period).collect()
  }

  async fn current_members(
    &self,
    group_id: Uuid,
    kind: MembershipKind,
  ) -> Result<Vec<Entity>> {
    let group_str = encode_uuid(group_id);
    let kind_str =
      encode_period_kind(PeriodKind::Membership(kind)).to_owned();

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.entity_id, e.kind, e.status, e.created_at
           FROM entities e
           JOIN periods p ON p.owner_id = e.entity_id
           WHERE p.group_id = ?1 AND p.kind = ?2 AND p.ended_at IS NULL
           ORDER BY p.started_at ASC, e.entity_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_str, kind_str], entity_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  async fn previous_members(
    &self,
    group_id: Uuid,
    kind: MembershipKind,
  ) -> Result<Vec<Entity>> {
    let group_str = encode_uuid(group_id);
    let kind_str =
      encode_period_kind(PeriodKind::Membership(kind)).to_owned();

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT e.entity_id, e.kind, e.status, e.created_at
           FROM entities e
           JOIN periods p ON p.owner_id = e.entity_id
           WHERE p.group_id = ?1 AND p.kind = ?2 AND p.ended_at IS NOT NULL
             AND NOT EXISTS (
               SELECT 1 FROM periods q
               WHERE q.owner_id = e.entity_id AND q.group_id = ?1
                 AND q.kind = ?2 AND q.ended_at IS NULL
             )
           ORDER BY e.created_at, e.entity_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_str, kind_str], entity_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  // ── Atomic batches ────────────────────────────────────────────────────────

  async fn apply(&self, ops: Vec<PeriodOp>) -> Result<()> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for op in &ops {
          match run_op(&tx, op)? {
            WriteOutcome::Done => {}
            // Dropping the transaction rolls back everything so far.
            other => return Ok(other),
          }
        }
        tx.commit()?;
        Ok(WriteOutcome::Done)
      })
      .await?;

    raise(outcome)
  }
}
