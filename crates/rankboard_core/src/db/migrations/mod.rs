//! Schema migrations, tracked through `PRAGMA user_version`.
//!
//! Migrations are append-only. A database newer than the binary is refused
//! rather than opened read-write.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "rank_store",
    sql: include_str!("0001_rank_store.sql"),
}];

/// Schema version this binary migrates to.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` up to [`latest_version`] in one IMMEDIATE transaction.
///
/// The version is read under the write lock, so two processes opening the
/// same file cannot both run a migration.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = tx.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let pending = pending_after(from_version)?;
    if pending.is_empty() {
        return Ok(());
    }

    for migration in pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    Ok(())
}

fn pending_after(version: u32) -> DbResult<&'static [Migration]> {
    let latest = latest_version();
    if version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: version,
            latest_supported: latest,
        });
    }
    let applied = MIGRATIONS
        .iter()
        .take_while(|migration| migration.version <= version)
        .count();
    Ok(&MIGRATIONS[applied..])
}

#[cfg(test)]
mod tests {
    use super::{latest_version, pending_after, MIGRATIONS};

    #[test]
    fn versions_are_strictly_increasing() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
        assert_eq!(latest_version(), MIGRATIONS.len() as u32);
    }

    #[test]
    fn pending_skips_applied_versions() {
        assert_eq!(pending_after(0).unwrap().len(), MIGRATIONS.len());
        assert!(pending_after(latest_version()).unwrap().is_empty());
        assert!(pending_after(latest_version() + 1).is_err());
    }
}
