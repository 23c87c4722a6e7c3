//! User, role and session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

choice_enum! {
    /// Account role. Closed set; capability checks live in `permissions`.
    pub enum Role {
        Admin => ("admin", "Administrator"),
        Staff => ("staff", "Staff"),
        Student => ("student", "Student"),
        Parent => ("parent", "Parent/Guardian"),
    }
}

choice_enum! {
    pub enum Theme {
        Light => ("light", "Light"),
        Dark => ("dark", "Dark"),
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

/// A hostel account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub theme: Theme,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: String, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            role,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            theme: Theme::default(),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    /// "First Last", falling back to the username when no name is set
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Split a free-form full name into first (first word) and last (the rest)
    pub fn set_full_name(&mut self, full_name: &str) {
        let mut words = full_name.split_whitespace();
        self.first_name = words.next().unwrap_or_default().to_string();
        self.last_name = words.collect::<Vec<_>>().join(" ");
    }
}

/// Active session for a logged-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Lifetimes past the representable range saturate
    pub fn new(user_id: Uuid, token: String, duration_hours: i64) -> Self {
        let now = Utc::now();
        let expires_at = chrono::Duration::try_hours(duration_hours)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(if duration_hours < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        Self {
            token,
            user_id,
            created_at: now,
            expires_at,
        }
    }
}

/// Per-user notification toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub email_notifications: bool,
    pub maintenance_notifications: bool,
    pub payment_notifications: bool,
}

impl NotificationPreferences {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_notifications: true,
            maintenance_notifications: true,
            payment_notifications: true,
        }
    }
}
