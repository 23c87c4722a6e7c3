//! User and session storage operations

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::filter::SqlFilter;
use super::parse::{
    fmt_datetime, parse_choice, parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt,
};
use crate::error::Result;
use crate::listing::{Page, PageWindow, DEFAULT_PAGE_SIZE};
use crate::models::{Role, Session, Theme, User};

const USER_COLUMNS: &str = "u.id, u.username, u.password_hash, u.role, u.first_name, u.last_name, \
     u.email, u.phone_number, u.theme, u.created_at, u.last_login";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: parse_choice(&row.get::<_, String>(3)?, Role::from_str)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        email: row.get(6)?,
        phone_number: row.get(7)?,
        theme: parse_choice(&row.get::<_, String>(8)?, Theme::from_str)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?)?,
        last_login: parse_datetime_opt(row.get::<_, Option<String>>(10)?)?,
    })
}

pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new user
    #[instrument(skip(self, user), fields(username = %user.username, role = %user.role.as_str()))]
    pub fn create(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, username, password_hash, role, first_name, last_name, email,
                                phone_number, theme, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.first_name,
                user.last_name,
                user.email,
                user.phone_number,
                user.theme.as_str(),
                fmt_datetime(&user.created_at),
                user.last_login.as_ref().map(fmt_datetime),
            ],
        )?;
        Ok(())
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS),
                params![id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Find user by username
    #[instrument(skip(self))]
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users u WHERE u.username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Total number of accounts
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of accounts holding a role
    pub fn count_by_role(&self, role: Role) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Ids of every account, or only those holding `role`
    pub fn ids_by_role(&self, role: Option<Role>) -> Result<Vec<Uuid>> {
        let filter = SqlFilter::new().eq("u.role", role.map(|r| r.as_str()));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT u.id FROM users u{} ORDER BY u.username",
            filter.where_sql()
        ))?;
        let ids = stmt
            .query_map(params_from_iter(filter.params()), |row| {
                parse_uuid(&row.get::<_, String>(0)?)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Students ordered by username, optionally searched by username
    #[instrument(skip(self))]
    pub fn list_students(&self, search: Option<&str>, page: Option<u32>) -> Result<Page<User>> {
        let filter = SqlFilter::new()
            .eq("u.role", Some(Role::Student.as_str()))
            .search(&["u.username"], search);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM users u{}", filter.where_sql()),
            params_from_iter(filter.params()),
            |row| row.get(0),
        )?;
        let window = PageWindow::resolve(page, total as u64, DEFAULT_PAGE_SIZE);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users u{} ORDER BY u.username LIMIT ? OFFSET ?",
            USER_COLUMNS,
            filter.where_sql()
        ))?;
        let users = stmt
            .query_map(
                params_from_iter(filter.params_with_page(window.per_page, window.offset)),
                user_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(window.into_page(users, total as u64))
    }

    /// Persist profile fields
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn update_profile(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, phone_number = ?4, theme = ?5
             WHERE id = ?6",
            params![
                user.first_name,
                user.last_name,
                user.email,
                user.phone_number,
                user.theme.as_str(),
                user.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Replace the stored password hash
    #[instrument(skip(self, password_hash))]
    pub fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id.to_string()],
        )?;
        Ok(())
    }

    /// Update last login time
    pub fn update_last_login(&self, user_id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![fmt_datetime(&Utc::now()), user_id.to_string()],
        )?;
        Ok(())
    }

    /// Create a session
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.user_id.to_string(),
                fmt_datetime(&session.created_at),
                fmt_datetime(&session.expires_at),
            ],
        )?;
        Ok(())
    }

    /// Find a session that has not yet expired
    #[instrument(skip(self, token))]
    pub fn find_valid_session(&self, token: &str) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM sessions
                 WHERE token = ?1 AND expires_at > ?2",
                params![token, fmt_datetime(&Utc::now())],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                        expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    /// Delete session
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Delete all sessions for user
    pub fn delete_user_sessions(&self, user_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(())
    }

    /// Clean up expired sessions
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![fmt_datetime(&Utc::now())],
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn create_user(db: &Database, username: &str, role: Role) -> User {
        let user = User::new(username.to_string(), "hash".to_string(), role);
        db.users().create(&user).unwrap();
        user
    }

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let mut user = create_user(&db, "alice", Role::Staff);
        user.set_full_name("Alice Smith");
        db.users().update_profile(&user).unwrap();

        let found = db.users().find_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Staff);
        assert_eq!(found.last_name, "Smith");
        assert!(db.users().find_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        create_user(&db, "alice", Role::Student);
        let dup = User::new("alice".into(), "hash".into(), Role::Student);
        assert!(db.users().create(&dup).is_err());
    }

    #[test]
    fn test_list_students_search_and_order() {
        let db = Database::open_in_memory().unwrap();
        create_user(&db, "zoe", Role::Student);
        create_user(&db, "adam", Role::Student);
        create_user(&db, "zack", Role::Staff);

        let page = db.users().list_students(None, None).unwrap();
        let names: Vec<_> = page.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["adam", "zoe"]);

        let page = db.users().list_students(Some("Z"), None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].username, "zoe");
    }

    #[test]
    fn test_ids_by_role() {
        let db = Database::open_in_memory().unwrap();
        let staff = create_user(&db, "bob", Role::Staff);
        create_user(&db, "amy", Role::Student);

        assert_eq!(db.users().ids_by_role(Some(Role::Staff)).unwrap(), vec![staff.id]);
        assert_eq!(db.users().ids_by_role(None).unwrap().len(), 2);
        assert!(db.users().ids_by_role(Some(Role::Parent)).unwrap().is_empty());
    }

    #[test]
    fn test_sessions() {
        let db = Database::open_in_memory().unwrap();
        let user = create_user(&db, "alice", Role::Student);

        let live = Session::new(user.id, "live-token".into(), 1);
        let stale = Session::new(user.id, "stale-token".into(), -1);
        db.users().create_session(&live).unwrap();
        db.users().create_session(&stale).unwrap();

        assert!(db.users().find_valid_session("live-token").unwrap().is_some());
        assert!(db.users().find_valid_session("stale-token").unwrap().is_none());
        assert_eq!(db.users().cleanup_expired_sessions().unwrap(), 1);

        db.users().delete_user_sessions(user.id).unwrap();
        assert!(db.users().find_valid_session("live-token").unwrap().is_none());
    }
}
