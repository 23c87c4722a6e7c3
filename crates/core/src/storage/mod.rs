//! SQLite storage layer for the hostel database

mod allocations;
mod complaints;
mod filter;
mod maintenance;
mod migrations;
mod notifications;
mod parse;
mod payments;
mod preferences;
mod rooms;
mod users;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use tracing::instrument;

use crate::error::Result;

pub use allocations::AllocationStore;
pub use complaints::ComplaintStore;
pub use maintenance::{MaintenanceCounts, MaintenanceStore};
pub use notifications::NotificationStore;
pub use payments::PaymentStore;
pub use preferences::PreferencesStore;
pub use rooms::{RoomCounts, RoomStore};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Register SQL functions and run migrations
    fn init(&self) -> Result<()> {
        register_functions(&self.conn)?;
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Underlying connection, for helpers that work on either the database
    /// or an open transaction
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that takes the write lock up front.
    /// Multi-step mutations run inside one of these so they commit or
    /// roll back as a unit.
    pub fn write_tx(&mut self) -> Result<Transaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(tx)
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    pub fn preferences(&self) -> PreferencesStore<'_> {
        PreferencesStore::new(&self.conn)
    }

    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    pub fn allocations(&self) -> AllocationStore<'_> {
        AllocationStore::new(&self.conn)
    }

    pub fn maintenance(&self) -> MaintenanceStore<'_> {
        MaintenanceStore::new(&self.conn)
    }

    pub fn payments(&self) -> PaymentStore<'_> {
        PaymentStore::new(&self.conn)
    }

    pub fn complaints(&self) -> ComplaintStore<'_> {
        ComplaintStore::new(&self.conn)
    }

    pub fn notifications(&self) -> NotificationStore<'_> {
        NotificationStore::new(&self.conn)
    }
}

/// `casefold(text)` lower-cases with full Unicode rules; SQLite's own
/// `lower()` and `LIKE` only fold ASCII. NULL stays NULL.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, Room, RoomType};

    #[test]
    fn test_schema_version_after_open() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version(), 4);
    }

    #[test]
    fn test_write_tx_rolls_back_on_drop() {
        let mut db = Database::open_in_memory().unwrap();
        {
            let tx = db.write_tx().unwrap();
            RoomStore::new(&tx)
                .create(&Room::new("101".into(), 1, RoomType::Single, Money::from_cents(1)))
                .unwrap();
        }
        assert!(db.rooms().find_by_number("101").unwrap().is_none());

        let tx = db.write_tx().unwrap();
        RoomStore::new(&tx)
            .create(&Room::new("102".into(), 1, RoomType::Single, Money::from_cents(1)))
            .unwrap();
        tx.commit().unwrap();
        assert!(db.rooms().find_by_number("102").unwrap().is_some());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostel.db");
        {
            let db = Database::open(&path).unwrap();
            db.rooms()
                .create(&Room::new("1".into(), 0, RoomType::Quad, Money::ZERO))
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.rooms().counts().unwrap().total, 1);
    }
}
