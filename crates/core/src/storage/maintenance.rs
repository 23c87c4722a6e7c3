//! Maintenance record storage operations

use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::filter::SqlFilter;
use super::parse::{
    fmt_date, fmt_datetime, parse_choice, parse_date, parse_date_opt, parse_datetime, parse_uuid,
    parse_uuid_opt, OptionalExt,
};
use crate::error::Result;
use crate::listing::{MaintenanceFilter, Page, PageWindow, DEFAULT_PAGE_SIZE};
use crate::models::{MaintenanceRecord, MaintenanceStatus, MaintenanceType};

const MAINTENANCE_COLUMNS: &str = "m.id, m.room_id, m.maintenance_type, m.description, m.reported_by, \
     m.assigned_to, m.status, m.scheduled_date, m.completion_date, m.remarks, m.created_at, m.updated_at";

const MAINTENANCE_FROM: &str = "maintenance_records m
     INNER JOIN rooms r ON r.id = m.room_id
     LEFT JOIN users u ON u.id = m.reported_by";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MaintenanceRecord> {
    Ok(MaintenanceRecord {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        room_id: parse_uuid(&row.get::<_, String>(1)?)?,
        maintenance_type: parse_choice(&row.get::<_, String>(2)?, MaintenanceType::from_str)?,
        description: row.get(3)?,
        reported_by: parse_uuid_opt(row.get::<_, Option<String>>(4)?)?,
        assigned_to: parse_uuid_opt(row.get::<_, Option<String>>(5)?)?,
        status: parse_choice(&row.get::<_, String>(6)?, MaintenanceStatus::from_str)?,
        scheduled_date: parse_date(&row.get::<_, String>(7)?)?,
        completion_date: parse_date_opt(row.get::<_, Option<String>>(8)?)?,
        remarks: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}

/// Maintenance counts for the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
}

pub struct MaintenanceStore<'a> {
    conn: &'a Connection,
}

impl<'a> MaintenanceStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a maintenance record
    #[instrument(skip(self, record), fields(room_id = %record.room_id))]
    pub fn create(&self, record: &MaintenanceRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO maintenance_records (id, room_id, maintenance_type, description, reported_by,
                 assigned_to, status, scheduled_date, completion_date, remarks, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id.to_string(),
                record.room_id.to_string(),
                record.maintenance_type.as_str(),
                record.description,
                record.reported_by.map(|id| id.to_string()),
                record.assigned_to.map(|id| id.to_string()),
                record.status.as_str(),
                fmt_date(&record.scheduled_date),
                record.completion_date.as_ref().map(fmt_date),
                record.remarks,
                fmt_datetime(&record.created_at),
                fmt_datetime(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Find record by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<MaintenanceRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM maintenance_records m WHERE m.id = ?1",
                    MAINTENANCE_COLUMNS
                ),
                params![id.to_string()],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Persist the mutable fields of a record
    #[instrument(skip(self, record), fields(id = %record.id, status = %record.status.as_str()))]
    pub fn update(&self, record: &MaintenanceRecord) -> Result<()> {
        self.conn.execute(
            "UPDATE maintenance_records
             SET status = ?1, assigned_to = ?2, completion_date = ?3, remarks = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                record.status.as_str(),
                record.assigned_to.map(|id| id.to_string()),
                record.completion_date.as_ref().map(fmt_date),
                record.remarks,
                fmt_datetime(&record.updated_at),
                record.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Records for one room, newest first
    pub fn list_for_room(&self, room_id: Uuid) -> Result<Vec<MaintenanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM maintenance_records m WHERE m.room_id = ?1
             ORDER BY m.created_at DESC, m.rowid DESC",
            MAINTENANCE_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![room_id.to_string()], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Filtered, searched and paginated list ordered by scheduled date, latest first
    #[instrument(skip(self))]
    pub fn list(&self, filter: &MaintenanceFilter) -> Result<Page<MaintenanceRecord>> {
        let sql_filter = SqlFilter::new()
            .eq("m.status", filter.status.map(|s| s.as_str()))
            .eq(
                "m.maintenance_type",
                filter.maintenance_type.map(|t| t.as_str()),
            )
            .search(
                &["r.number", "m.description", "u.username"],
                filter.search.as_deref(),
            );

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", MAINTENANCE_FROM, sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;
        let window = PageWindow::resolve(filter.page, total as u64, DEFAULT_PAGE_SIZE);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {}{} ORDER BY m.scheduled_date DESC, m.status, m.rowid DESC LIMIT ? OFFSET ?",
            MAINTENANCE_COLUMNS,
            MAINTENANCE_FROM,
            sql_filter.where_sql()
        ))?;
        let records = stmt
            .query_map(
                params_from_iter(sql_filter.params_with_page(window.per_page, window.offset)),
                record_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(window.into_page(records, total as u64))
    }

    /// Counts of pending, in-progress and completed work
    pub fn counts(&self) -> Result<MaintenanceCounts> {
        let count = |status: MaintenanceStatus| -> Result<u64> {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM maintenance_records WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        };
        Ok(MaintenanceCounts {
            pending: count(MaintenanceStatus::Pending)?,
            in_progress: count(MaintenanceStatus::InProgress)?,
            completed: count(MaintenanceStatus::Completed)?,
        })
    }
}
