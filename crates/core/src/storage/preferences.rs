//! Notification preference persistence

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse::fmt_datetime;
use crate::error::Result;
use crate::models::NotificationPreferences;

/// Preferences store
pub struct PreferencesStore<'a> {
    conn: &'a Connection,
}

impl<'a> PreferencesStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Save user preferences
    pub fn save(&self, prefs: &NotificationPreferences) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO notification_preferences
                (user_id, email_notifications, maintenance_notifications, payment_notifications, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                prefs.user_id.to_string(),
                prefs.email_notifications,
                prefs.maintenance_notifications,
                prefs.payment_notifications,
                fmt_datetime(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Load user preferences, falling back to defaults when never saved
    pub fn load(&self, user_id: Uuid) -> Result<NotificationPreferences> {
        let result = self.conn.query_row(
            "SELECT email_notifications, maintenance_notifications, payment_notifications
             FROM notification_preferences WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(NotificationPreferences {
                    user_id,
                    email_notifications: row.get(0)?,
                    maintenance_notifications: row.get(1)?,
                    payment_notifications: row.get(2)?,
                })
            },
        );

        match result {
            Ok(prefs) => Ok(prefs),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Ok(NotificationPreferences::defaults_for(user_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use crate::storage::Database;

    fn create_test_user(db: &Database) -> Uuid {
        let user = User::new(format!("testuser_{}", Uuid::new_v4()), "hash".into(), Role::Student);
        db.users().create(&user).unwrap();
        user.id
    }

    #[test]
    fn test_preferences_save_load() {
        let db = Database::open_in_memory().unwrap();
        let user_id = create_test_user(&db);

        let mut prefs = NotificationPreferences::defaults_for(user_id);
        prefs.payment_notifications = false;
        db.preferences().save(&prefs).unwrap();

        assert_eq!(db.preferences().load(user_id).unwrap(), prefs);
    }

    #[test]
    fn test_preferences_default() {
        let db = Database::open_in_memory().unwrap();
        let user_id = create_test_user(&db);

        let prefs = db.preferences().load(user_id).unwrap();
        assert!(prefs.email_notifications);
        assert!(prefs.maintenance_notifications);
        assert!(prefs.payment_notifications);
    }
}
