//! Notification storage: messages, recipients and per-user read state

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::filter::SqlFilter;
use super::parse::{
    fmt_datetime, parse_choice, parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt,
};
use crate::error::Result;
use crate::listing::{NotificationFilter, Page, PageWindow, NOTIFICATION_PAGE_SIZE};
use crate::models::{Notification, NotificationType, NotificationView, Priority};

const NOTIFICATION_COLUMNS: &str = "n.id, n.title, n.message, n.notification_type, n.priority, \
     n.sender_id, n.created_at, n.updated_at, n.scheduled_for, n.expires_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        message: row.get(2)?,
        notification_type: parse_choice(&row.get::<_, String>(3)?, NotificationType::from_str)?,
        priority: parse_choice(&row.get::<_, String>(4)?, Priority::from_str)?,
        sender_id: parse_uuid(&row.get::<_, String>(5)?)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(7)?)?,
        scheduled_for: parse_datetime_opt(row.get::<_, Option<String>>(8)?)?,
        expires_at: parse_datetime_opt(row.get::<_, Option<String>>(9)?)?,
    })
}

/// Recipient join plus the scheduled/expiry window. `now` is bound twice.
fn visible_to(user_id: Uuid, now: &DateTime<Utc>) -> SqlFilter {
    let now = fmt_datetime(now);
    SqlFilter::new()
        .raw(
            "nr.user_id = ?",
            [Value::Text(user_id.to_string())],
        )
        .raw(
            "(n.scheduled_for IS NULL OR n.scheduled_for <= ?)",
            [Value::Text(now.clone())],
        )
        .raw(
            "(n.expires_at IS NULL OR n.expires_at > ?)",
            [Value::Text(now)],
        )
}

/// Visibility plus the type, priority and search filters; ignores
/// `unread_only` and `page`
fn inbox_filter(user_id: Uuid, filter: &NotificationFilter, now: &DateTime<Utc>) -> SqlFilter {
    visible_to(user_id, now)
        .eq(
            "n.notification_type",
            filter.notification_type.map(|t| t.as_str()),
        )
        .eq("n.priority", filter.priority.map(|p| p.as_str()))
        .search(&["n.title", "n.message"], filter.search.as_deref())
}

const INBOX_FROM: &str = "notifications n
     INNER JOIN notification_recipients nr ON nr.notification_id = n.id
     LEFT JOIN notification_reads rd ON rd.notification_id = n.id AND rd.user_id = nr.user_id";

pub struct NotificationStore<'a> {
    conn: &'a Connection,
}

impl<'a> NotificationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a notification without recipients
    #[instrument(skip(self, notification), fields(title = %notification.title))]
    pub fn create(&self, notification: &Notification) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notifications (id, title, message, notification_type, priority, sender_id,
                 created_at, updated_at, scheduled_for, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                notification.id.to_string(),
                notification.title,
                notification.message,
                notification.notification_type.as_str(),
                notification.priority.as_str(),
                notification.sender_id.to_string(),
                fmt_datetime(&notification.created_at),
                fmt_datetime(&notification.updated_at),
                notification.scheduled_for.as_ref().map(fmt_datetime),
                notification.expires_at.as_ref().map(fmt_datetime),
            ],
        )?;
        Ok(())
    }

    /// Add recipients; duplicates are ignored
    #[instrument(skip(self, user_ids), fields(count = user_ids.len()))]
    pub fn add_recipients(&self, notification_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO notification_recipients (notification_id, user_id) VALUES (?1, ?2)",
        )?;
        for user_id in user_ids {
            stmt.execute(params![notification_id.to_string(), user_id.to_string()])?;
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM notifications n WHERE n.id = ?1",
                    NOTIFICATION_COLUMNS
                ),
                params![id.to_string()],
                notification_from_row,
            )
            .optional()?;
        Ok(notification)
    }

    /// Recipient ids in insertion order
    pub fn recipients(&self, notification_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM notification_recipients WHERE notification_id = ?1 ORDER BY rowid",
        )?;
        let ids = stmt
            .query_map(params![notification_id.to_string()], |row| {
                parse_uuid(&row.get::<_, String>(0)?)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn is_recipient(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notification_recipients
                           WHERE notification_id = ?1 AND user_id = ?2)",
            params![notification_id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Record a read; repeating it keeps the first timestamp
    #[instrument(skip(self))]
    pub fn mark_read(&self, notification_id: Uuid, user_id: Uuid, at: &DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO notification_reads (notification_id, user_id, read_at)
             VALUES (?1, ?2, ?3)",
            params![
                notification_id.to_string(),
                user_id.to_string(),
                fmt_datetime(at)
            ],
        )?;
        Ok(())
    }

    pub fn is_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notification_reads
                           WHERE notification_id = ?1 AND user_id = ?2)",
            params![notification_id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// A user's visible inbox, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        now: &DateTime<Utc>,
    ) -> Result<Page<NotificationView>> {
        let mut sql_filter = inbox_filter(user_id, filter, now);
        if filter.unread_only {
            sql_filter = sql_filter.clause("rd.user_id IS NULL");
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", INBOX_FROM, sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;
        let window = PageWindow::resolve(filter.page, total as u64, NOTIFICATION_PAGE_SIZE);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, rd.user_id IS NOT NULL FROM {}{}
             ORDER BY n.created_at DESC, n.rowid DESC LIMIT ? OFFSET ?",
            NOTIFICATION_COLUMNS,
            INBOX_FROM,
            sql_filter.where_sql()
        ))?;
        let views = stmt
            .query_map(
                params_from_iter(sql_filter.params_with_page(window.per_page, window.offset)),
                |row| {
                    Ok(NotificationView {
                        notification: notification_from_row(row)?,
                        is_read: row.get(10)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(window.into_page(views, total as u64))
    }

    /// Visible notifications the user has not read
    pub fn unread_count(&self, user_id: Uuid, now: &DateTime<Utc>) -> Result<u64> {
        self.count_unread(visible_to(user_id, now))
    }

    /// Unread rows among those the inbox filter selects
    #[instrument(skip(self, filter, now))]
    pub fn unread_matching(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        now: &DateTime<Utc>,
    ) -> Result<u64> {
        self.count_unread(inbox_filter(user_id, filter, now))
    }

    fn count_unread(&self, visible: SqlFilter) -> Result<u64> {
        let sql_filter = visible.clause("rd.user_id IS NULL");
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", INBOX_FROM, sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}
