//! Complaint storage operations

use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::filter::SqlFilter;
use super::parse::{
    fmt_datetime, parse_choice, parse_datetime, parse_datetime_opt, parse_uuid, parse_uuid_opt,
    OptionalExt,
};
use crate::error::Result;
use crate::listing::{ComplaintFilter, Page, PageWindow, DEFAULT_PAGE_SIZE};
use crate::models::{Complaint, ComplaintCategory, ComplaintStatus};

const COMPLAINT_COLUMNS: &str = "c.id, c.title, c.description, c.category, c.status, c.room_id, \
     c.reported_by, c.assigned_to, c.resolution, c.resolved_at, c.created_at, c.updated_at";

fn complaint_from_row(row: &Row<'_>) -> rusqlite::Result<Complaint> {
    Ok(Complaint {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: parse_choice(&row.get::<_, String>(3)?, ComplaintCategory::from_str)?,
        status: parse_choice(&row.get::<_, String>(4)?, ComplaintStatus::from_str)?,
        room_id: parse_uuid_opt(row.get::<_, Option<String>>(5)?)?,
        reported_by: parse_uuid(&row.get::<_, String>(6)?)?,
        assigned_to: parse_uuid_opt(row.get::<_, Option<String>>(7)?)?,
        resolution: row.get(8)?,
        resolved_at: parse_datetime_opt(row.get::<_, Option<String>>(9)?)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}

pub struct ComplaintStore<'a> {
    conn: &'a Connection,
}

impl<'a> ComplaintStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new complaint
    #[instrument(skip(self, complaint), fields(title = %complaint.title))]
    pub fn create(&self, complaint: &Complaint) -> Result<()> {
        self.conn.execute(
            "INSERT INTO complaints (id, title, description, category, status, room_id, reported_by,
                 assigned_to, resolution, resolved_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                complaint.id.to_string(),
                complaint.title,
                complaint.description,
                complaint.category.as_str(),
                complaint.status.as_str(),
                complaint.room_id.map(|id| id.to_string()),
                complaint.reported_by.to_string(),
                complaint.assigned_to.map(|id| id.to_string()),
                complaint.resolution,
                complaint.resolved_at.as_ref().map(fmt_datetime),
                fmt_datetime(&complaint.created_at),
                fmt_datetime(&complaint.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Find complaint by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Complaint>> {
        let complaint = self
            .conn
            .query_row(
                &format!("SELECT {} FROM complaints c WHERE c.id = ?1", COMPLAINT_COLUMNS),
                params![id.to_string()],
                complaint_from_row,
            )
            .optional()?;
        Ok(complaint)
    }

    /// Persist status, assignment and resolution
    #[instrument(skip(self, complaint), fields(id = %complaint.id, status = %complaint.status.as_str()))]
    pub fn update(&self, complaint: &Complaint) -> Result<()> {
        self.conn.execute(
            "UPDATE complaints
             SET status = ?1, assigned_to = ?2, resolution = ?3, resolved_at = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                complaint.status.as_str(),
                complaint.assigned_to.map(|id| id.to_string()),
                complaint.resolution,
                complaint.resolved_at.as_ref().map(fmt_datetime),
                fmt_datetime(&complaint.updated_at),
                complaint.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Filtered, searched and paginated list, newest first
    #[instrument(skip(self))]
    pub fn list(&self, filter: &ComplaintFilter) -> Result<Page<Complaint>> {
        let sql_filter = SqlFilter::new()
            .eq("c.status", filter.status.map(|s| s.as_str()))
            .eq("c.category", filter.category.map(|c| c.as_str()))
            .search(
                &[
                    "c.title",
                    "c.description",
                    "u.username",
                    "u.first_name",
                    "u.last_name",
                ],
                filter.search.as_deref(),
            );
        let from = "complaints c INNER JOIN users u ON u.id = c.reported_by";

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", from, sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;
        let window = PageWindow::resolve(filter.page, total as u64, DEFAULT_PAGE_SIZE);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {}{} ORDER BY c.created_at DESC, c.rowid DESC LIMIT ? OFFSET ?",
            COMPLAINT_COLUMNS,
            from,
            sql_filter.where_sql()
        ))?;
        let complaints = stmt
            .query_map(
                params_from_iter(sql_filter.params_with_page(window.per_page, window.offset)),
                complaint_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(window.into_page(complaints, total as u64))
    }

    /// Most recently filed complaints
    pub fn list_recent(&self, limit: u32) -> Result<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM complaints c ORDER BY c.created_at DESC, c.rowid DESC LIMIT ?1",
            COMPLAINT_COLUMNS
        ))?;
        let complaints = stmt
            .query_map(params![limit], complaint_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(complaints)
    }

    /// A user's latest complaints
    pub fn list_for_reporter(&self, reporter_id: Uuid, limit: u32) -> Result<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM complaints c WHERE c.reported_by = ?1
             ORDER BY c.created_at DESC, c.rowid DESC LIMIT ?2",
            COMPLAINT_COLUMNS
        ))?;
        let complaints = stmt
            .query_map(params![reporter_id.to_string(), limit], complaint_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(complaints)
    }

    /// Complaints not yet resolved or closed
    pub fn count_open(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM complaints WHERE status IN ('open', 'in_progress')",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}
