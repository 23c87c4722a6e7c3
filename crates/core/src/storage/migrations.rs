//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'student',
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                phone_number TEXT NOT NULL DEFAULT '',
                theme TEXT NOT NULL DEFAULT 'light',
                created_at TEXT NOT NULL,
                last_login TEXT
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Rooms table
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                number TEXT NOT NULL UNIQUE,
                floor INTEGER NOT NULL,
                room_type TEXT NOT NULL,
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                current_occupancy INTEGER NOT NULL DEFAULT 0
                    CHECK (current_occupancy >= 0 AND current_occupancy <= capacity),
                status TEXT NOT NULL DEFAULT 'available',
                monthly_rent INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                amenities TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Allocations table
            CREATE TABLE IF NOT EXISTS allocations (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                student_id TEXT NOT NULL,
                check_in_date TEXT NOT NULL,
                check_out_date TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
                FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
                UNIQUE(room_id, student_id, check_in_date)
            );

            -- Maintenance records table
            CREATE TABLE IF NOT EXISTS maintenance_records (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                maintenance_type TEXT NOT NULL,
                description TEXT NOT NULL,
                reported_by TEXT,
                assigned_to TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                scheduled_date TEXT NOT NULL,
                completion_date TEXT,
                remarks TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
                FOREIGN KEY (reported_by) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (assigned_to) REFERENCES users(id) ON DELETE SET NULL
            );

            -- Payments table
            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                allocation_id TEXT,
                payment_type TEXT NOT NULL,
                amount INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                due_date TEXT NOT NULL,
                payment_date TEXT,
                transaction_id TEXT NOT NULL DEFAULT '',
                payment_method TEXT NOT NULL DEFAULT '',
                remarks TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (allocation_id) REFERENCES allocations(id) ON DELETE SET NULL
            );

            -- Complaints table
            CREATE TABLE IF NOT EXISTS complaints (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                room_id TEXT,
                reported_by TEXT NOT NULL,
                assigned_to TEXT,
                resolution TEXT,
                resolved_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE SET NULL,
                FOREIGN KEY (reported_by) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (assigned_to) REFERENCES users(id) ON DELETE SET NULL
            );

            -- Notifications and their recipient/read sets
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                notification_type TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'medium',
                sender_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                scheduled_for TEXT,
                expires_at TEXT,
                FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS notification_recipients (
                notification_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY (notification_id, user_id),
                FOREIGN KEY (notification_id) REFERENCES notifications(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS notification_reads (
                notification_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                read_at TEXT NOT NULL,
                PRIMARY KEY (notification_id, user_id),
                FOREIGN KEY (notification_id) REFERENCES notifications(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            -- Room and allocation indexes
            CREATE INDEX IF NOT EXISTS idx_rooms_floor_number ON rooms(floor, number);
            CREATE INDEX IF NOT EXISTS idx_allocations_room ON allocations(room_id);
            CREATE INDEX IF NOT EXISTS idx_allocations_student ON allocations(student_id);

            -- Maintenance indexes
            CREATE INDEX IF NOT EXISTS idx_maintenance_room ON maintenance_records(room_id);
            CREATE INDEX IF NOT EXISTS idx_maintenance_scheduled ON maintenance_records(scheduled_date);

            -- Payment and complaint indexes
            CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id);
            CREATE INDEX IF NOT EXISTS idx_payments_due ON payments(due_date);
            CREATE INDEX IF NOT EXISTS idx_complaints_room ON complaints(room_id);
            CREATE INDEX IF NOT EXISTS idx_complaints_created ON complaints(created_at);

            -- Notification indexes
            CREATE INDEX IF NOT EXISTS idx_notification_recipients_user
                ON notification_recipients(user_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications(created_at);
        "#,
    },
    Migration {
        version: 3,
        description: "One active allocation per student",
        sql: r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_allocations_one_active
                ON allocations(student_id) WHERE is_active = 1;
        "#,
    },
    Migration {
        version: 4,
        description: "Add notification preferences",
        sql: r#"
            CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT PRIMARY KEY,
                email_notifications INTEGER NOT NULL DEFAULT 1,
                maintenance_notifications INTEGER NOT NULL DEFAULT 1,
                payment_notifications INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            super::parse::fmt_datetime(&chrono::Utc::now())
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;
            tx.commit()?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        // Verify migrations are numbered sequentially
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }

    #[test]
    fn test_expected_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "users",
            "sessions",
            "rooms",
            "allocations",
            "maintenance_records",
            "payments",
            "complaints",
            "notifications",
            "notification_recipients",
            "notification_reads",
            "notification_preferences",
        ] {
            let count: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }
}
