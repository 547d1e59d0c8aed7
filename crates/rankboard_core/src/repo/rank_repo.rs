//! Rank store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for containers and their ordered members.
//! - Execute move plans (the reindexer) as one IMMEDIATE transaction.
//!
//! # Invariants
//! - `sort_order` is dense (`0..n`) per container outside a transaction.
//! - Listing is deterministic: `sort_order ASC, member_uuid ASC`.
//! - Every read that decides a write happens inside the write transaction.
//! - The store is the only writer of `container_uuid` and `sort_order`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::engine::{
    density_report, plan_move, plan_removal, validate_destination, DensityReport, MovePlan,
    RankBoundError, RankShift,
};
use crate::model::member::{Container, ContainerId, Member, MemberId, MoveRequest, Placement, Rank};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

/// Rank the moved member holds while shifts run. Never visible to readers.
const PARKED_RANK: i64 = -1;
/// Shifted rows are staged at `-(new_rank) - STAGING_OFFSET` so the staged
/// values can collide neither with live ranks nor with `PARKED_RANK`.
const STAGING_OFFSET: i64 = 2;

const MEMBER_SELECT_SQL: &str = "SELECT
    member_uuid,
    container_uuid,
    sort_order,
    created_at,
    updated_at
FROM members";

/// Result type used by rank store operations.
pub type RankStoreResult<T> = Result<T, RankStoreError>;

/// Errors from rank store operations.
#[derive(Debug, Error)]
pub enum RankStoreError {
    /// Underlying SQLite/bootstrap error.
    #[error(transparent)]
    Db(#[from] DbError),
    /// Member does not exist.
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),
    /// Container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(ContainerId),
    /// Destination rank outside `0..=max` for the destination container.
    #[error("destination rank {rank} is outside 0..={max}")]
    RankOutOfRange { rank: Rank, max: Rank },
    /// Caller's view of the member's container is out of date.
    #[error("member {member_id} is in container {actual}, request expected {expected}")]
    StaleSource {
        member_id: MemberId,
        expected: ContainerId,
        actual: ContainerId,
    },
    /// Connection schema is not at the expected migrated version.
    #[error("rank store requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    #[error("rank store requires table `{0}`")]
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    #[error("rank store requires column `{column}` in table `{table}`")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    #[error("invalid rank data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RankStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RankBoundError> for RankStoreError {
    fn from(value: RankBoundError) -> Self {
        Self::RankOutOfRange {
            rank: value.rank,
            max: value.max,
        }
    }
}

/// Result of one committed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Member as persisted after the move.
    pub member: Member,
    /// Placement before the move.
    pub previous: Placement,
    /// Distinct member rows written; `0` for a no-op move.
    pub rows_written: usize,
}

impl MoveOutcome {
    pub fn is_noop(&self) -> bool {
        self.rows_written == 0
    }
}

/// Repository interface for ordered members.
pub trait RankStore {
    /// Creates one empty container.
    fn create_container(&self) -> RankStoreResult<Container>;
    /// Returns whether the container exists.
    fn container_exists(&self, container_id: ContainerId) -> RankStoreResult<bool>;
    /// Lists every container, oldest first.
    fn list_containers(&self) -> RankStoreResult<Vec<Container>>;
    /// Deletes one container together with its members.
    fn delete_container(&self, container_id: ContainerId) -> RankStoreResult<()>;
    /// Appends one member at the end of a container.
    fn create_member(&self, container_id: ContainerId) -> RankStoreResult<Member>;
    /// Loads one member by id.
    fn get_member(&self, member_id: MemberId) -> RankStoreResult<Option<Member>>;
    /// Counts members in a container.
    fn member_count(&self, container_id: ContainerId) -> RankStoreResult<u32>;
    /// Lists members of a container in rank order.
    fn list_members(&self, container_id: ContainerId) -> RankStoreResult<Vec<Member>>;
    /// Removes one member and closes the gap it leaves.
    fn delete_member(&self, member_id: MemberId) -> RankStoreResult<Member>;
    /// Moves one member, shifting its neighbours, atomically.
    fn move_member(&self, request: &MoveRequest) -> RankStoreResult<MoveOutcome>;
    /// Reports gaps and duplicates in one container. Read-only.
    fn audit_density(&self, container_id: ContainerId) -> RankStoreResult<DensityReport>;
    /// Rewrites ranks densely in current order; returns rows whose rank changed.
    fn renumber_container(&self, container_id: ContainerId) -> RankStoreResult<usize>;
}

/// SQLite-backed rank store.
pub struct SqliteRankStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRankStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RankStoreResult<Self> {
        ensure_rank_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn begin(&self) -> RankStoreResult<Transaction<'conn>> {
        // IMMEDIATE takes the write lock up front: two moves into one container
        // serialize instead of computing shifts against the same snapshot.
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl RankStore for SqliteRankStore<'_> {
    fn create_container(&self) -> RankStoreResult<Container> {
        let container_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO containers (container_uuid) VALUES (?1);",
            [container_id.to_string()],
        )?;
        load_required_container(self.conn, container_id)
    }

    fn container_exists(&self, container_id: ContainerId) -> RankStoreResult<bool> {
        container_exists(self.conn, container_id)
    }

    fn list_containers(&self) -> RankStoreResult<Vec<Container>> {
        let mut stmt = self.conn.prepare(
            "SELECT container_uuid, created_at, updated_at
             FROM containers
             ORDER BY created_at ASC, container_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_container_row(row)?);
        }
        Ok(items)
    }

    fn delete_container(&self, container_id: ContainerId) -> RankStoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM containers WHERE container_uuid = ?1;",
            [container_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RankStoreError::ContainerNotFound(container_id));
        }
        Ok(())
    }

    fn create_member(&self, container_id: ContainerId) -> RankStoreResult<Member> {
        let tx = self.begin()?;
        ensure_container_exists(&tx, container_id)?;

        let member_id = Uuid::new_v4();
        let sort_order = next_sort_order(&tx, container_id)?;
        tx.execute(
            "INSERT INTO members (member_uuid, container_uuid, sort_order)
             VALUES (?1, ?2, ?3);",
            params![member_id.to_string(), container_id.to_string(), sort_order],
        )?;
        let member = load_required_member(&tx, member_id)?;
        tx.commit()?;
        Ok(member)
    }

    fn get_member(&self, member_id: MemberId) -> RankStoreResult<Option<Member>> {
        load_member(self.conn, member_id)
    }

    fn member_count(&self, container_id: ContainerId) -> RankStoreResult<u32> {
        ensure_container_exists(self.conn, container_id)?;
        count_members(self.conn, container_id)
    }

    fn list_members(&self, container_id: ContainerId) -> RankStoreResult<Vec<Member>> {
        ensure_container_exists(self.conn, container_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE container_uuid = ?1
             ORDER BY sort_order ASC, member_uuid ASC;"
        ))?;
        let mut rows = stmt.query([container_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_member_row(row)?);
        }
        Ok(items)
    }

    fn delete_member(&self, member_id: MemberId) -> RankStoreResult<Member> {
        let tx = self.begin()?;
        let member = load_required_member(&tx, member_id)?;

        tx.execute(
            "DELETE FROM members WHERE member_uuid = ?1;",
            [member_id.to_string()],
        )?;
        shift_ranks(&tx, &plan_removal(member.placement()))?;

        tx.commit()?;
        Ok(member)
    }

    fn move_member(&self, request: &MoveRequest) -> RankStoreResult<MoveOutcome> {
        let tx = self.begin()?;
        let member = load_required_member(&tx, request.member_id)?;
        ensure_container_exists(&tx, request.destination_container_id)?;
        if member.container_id != request.source_container_id {
            return Err(RankStoreError::StaleSource {
                member_id: member.id,
                expected: request.source_container_id,
                actual: member.container_id,
            });
        }

        let from = member.placement();
        let to = request.destination();
        let destination_count = count_members(&tx, to.container_id)?;
        validate_destination(from, to, destination_count)?;

        let plan = plan_move(member.id, from, to);
        let rows_written = apply_plan(&tx, &plan)?;
        let updated = if plan.is_noop() {
            member
        } else {
            load_required_member(&tx, request.member_id)?
        };

        tx.commit()?;
        Ok(MoveOutcome {
            member: updated,
            previous: from,
            rows_written,
        })
    }

    fn audit_density(&self, container_id: ContainerId) -> RankStoreResult<DensityReport> {
        ensure_container_exists(self.conn, container_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT sort_order
             FROM members
             WHERE container_uuid = ?1;",
        )?;
        let mut rows = stmt.query([container_id.to_string()])?;
        let mut ranks = Vec::new();
        while let Some(row) = rows.next()? {
            ranks.push(row.get::<_, i64>(0)?);
        }
        Ok(density_report(container_id, &ranks))
    }

    fn renumber_container(&self, container_id: ContainerId) -> RankStoreResult<usize> {
        let tx = self.begin()?;
        ensure_container_exists(&tx, container_id)?;

        let mut stmt = tx.prepare(
            "SELECT member_uuid, sort_order
             FROM members
             WHERE container_uuid = ?1
             ORDER BY sort_order ASC, member_uuid ASC;",
        )?;
        let mut rows = stmt.query([container_id.to_string()])?;
        let mut current = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            current.push((parse_uuid(&value, "members.member_uuid")?, row.get::<_, i64>(1)?));
        }
        drop(rows);
        drop(stmt);

        let changed = current
            .iter()
            .enumerate()
            .filter(|(index, (_, sort_order))| *index as i64 != *sort_order)
            .count();
        if changed == 0 {
            return Ok(0);
        }

        for (index, (member_id, _)) in current.iter().enumerate() {
            tx.execute(
                "UPDATE members
                 SET sort_order = ?2
                 WHERE member_uuid = ?1;",
                params![member_id.to_string(), staged(index as i64)],
            )?;
        }
        unstage_ranks(&tx, container_id)?;

        tx.commit()?;
        Ok(changed)
    }
}

/// Executes a plan inside the caller's transaction.
///
/// Returns the number of distinct member rows written.
fn apply_plan(conn: &Connection, plan: &MovePlan) -> RankStoreResult<usize> {
    let MovePlan::Reindex {
        member_id,
        to,
        shifts,
        ..
    } = plan
    else {
        return Ok(0);
    };

    park_member(conn, *member_id)?;
    let mut rows_written = 0;
    for shift in shifts {
        rows_written += shift_ranks(conn, shift)?;
    }
    place_member(conn, *member_id, *to)?;
    Ok(rows_written + 1)
}

fn park_member(conn: &Connection, member_id: MemberId) -> RankStoreResult<()> {
    let changed = conn.execute(
        "UPDATE members SET sort_order = ?2 WHERE member_uuid = ?1;",
        params![member_id.to_string(), PARKED_RANK],
    )?;
    if changed == 0 {
        return Err(RankStoreError::MemberNotFound(member_id));
    }
    Ok(())
}

fn place_member(conn: &Connection, member_id: MemberId, to: Placement) -> RankStoreResult<()> {
    let changed = conn.execute(
        "UPDATE members
         SET container_uuid = ?2,
             sort_order = ?3,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE member_uuid = ?1;",
        params![member_id.to_string(), to.container_id.to_string(), to.rank],
    )?;
    if changed == 0 {
        return Err(RankStoreError::MemberNotFound(member_id));
    }
    Ok(())
}

/// Moves every rank in `shift.range` by `shift.delta`.
///
/// The UNIQUE index is checked row by row, so rows are first staged into a
/// disjoint negative encoding and then flipped back in a second statement.
fn shift_ranks(conn: &Connection, shift: &RankShift) -> RankStoreResult<usize> {
    if shift.range.is_empty() {
        return Ok(0);
    }
    let shifted = conn.execute(
        "UPDATE members
         SET sort_order = -(sort_order + ?4) - ?5
         WHERE container_uuid = ?1
           AND sort_order >= ?2
           AND (?3 IS NULL OR sort_order < ?3);",
        params![
            shift.container_id.to_string(),
            shift.range.start,
            shift.range.end,
            shift.delta.as_i64(),
            STAGING_OFFSET,
        ],
    )?;
    if shifted == 0 {
        return Ok(0);
    }
    unstage_ranks(conn, shift.container_id)?;
    Ok(shifted)
}

fn unstage_ranks(conn: &Connection, container_id: ContainerId) -> RankStoreResult<()> {
    conn.execute(
        "UPDATE members
         SET sort_order = -sort_order - ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE container_uuid = ?1
           AND sort_order <= -?2;",
        params![container_id.to_string(), STAGING_OFFSET],
    )?;
    Ok(())
}

fn staged(rank: i64) -> i64 {
    -rank - STAGING_OFFSET
}

fn next_sort_order(conn: &Connection, container_id: ContainerId) -> RankStoreResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1
         FROM members
         WHERE container_uuid = ?1;",
        [container_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn count_members(conn: &Connection, container_id: ContainerId) -> RankStoreResult<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE container_uuid = ?1;",
        [container_id.to_string()],
        |row| row.get(0),
    )?;
    u32::try_from(count)
        .map_err(|_| RankStoreError::InvalidData(format!("member count `{count}` exceeds rank range")))
}

fn container_exists(conn: &Connection, container_id: ContainerId) -> RankStoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM containers WHERE container_uuid = ?1
        );",
        [container_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_container_exists(conn: &Connection, container_id: ContainerId) -> RankStoreResult<()> {
    if !container_exists(conn, container_id)? {
        return Err(RankStoreError::ContainerNotFound(container_id));
    }
    Ok(())
}

fn load_required_container(
    conn: &Connection,
    container_id: ContainerId,
) -> RankStoreResult<Container> {
    conn.query_row(
        "SELECT container_uuid, created_at, updated_at
         FROM containers
         WHERE container_uuid = ?1;",
        [container_id.to_string()],
        |row| Ok(parse_container_row(row)),
    )
    .optional()?
    .unwrap_or(Err(RankStoreError::ContainerNotFound(container_id)))
}

fn load_member(conn: &Connection, member_id: MemberId) -> RankStoreResult<Option<Member>> {
    let mut stmt = conn.prepare(&format!("{MEMBER_SELECT_SQL} WHERE member_uuid = ?1;"))?;
    let mut rows = stmt.query([member_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_member_row(row)?));
    }
    Ok(None)
}

fn load_required_member(conn: &Connection, member_id: MemberId) -> RankStoreResult<Member> {
    load_member(conn, member_id)?.ok_or(RankStoreError::MemberNotFound(member_id))
}

fn parse_container_row(row: &Row<'_>) -> RankStoreResult<Container> {
    let container_uuid_text: String = row.get("container_uuid")?;
    Ok(Container {
        id: parse_uuid(&container_uuid_text, "containers.container_uuid")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> RankStoreResult<Member> {
    let member_uuid_text: String = row.get("member_uuid")?;
    let container_uuid_text: String = row.get("container_uuid")?;
    let sort_order: i64 = row.get("sort_order")?;
    let order = Rank::try_from(sort_order).map_err(|_| {
        RankStoreError::InvalidData(format!(
            "invalid sort_order `{sort_order}` in members.sort_order"
        ))
    })?;

    Ok(Member {
        id: parse_uuid(&member_uuid_text, "members.member_uuid")?,
        container_id: parse_uuid(&container_uuid_text, "members.container_uuid")?,
        order,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RankStoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RankStoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_rank_connection_ready(conn: &Connection) -> RankStoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RankStoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        ("containers", &["container_uuid", "created_at", "updated_at"]),
        (
            "members",
            &[
                "member_uuid",
                "container_uuid",
                "sort_order",
                "created_at",
                "updated_at",
            ],
        ),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RankStoreError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RankStoreError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RankStoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RankStoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
