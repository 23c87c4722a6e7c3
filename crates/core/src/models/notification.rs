//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

choice_enum! {
    pub enum NotificationType {
        Payment => ("payment", "Payment Reminder"),
        Maintenance => ("maintenance", "Maintenance Update"),
        Announcement => ("announcement", "General Announcement"),
        Complaint => ("complaint", "Complaint Update"),
        Event => ("event", "Event Information"),
    }
}

choice_enum! {
    pub enum Priority {
        Low => ("low", "Low"),
        Medium => ("medium", "Medium"),
        High => ("high", "High"),
        Urgent => ("urgent", "Urgent"),
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// A message fanned out to a set of recipients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub sender_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(
        title: String,
        message: String,
        notification_type: NotificationType,
        priority: Priority,
        sender_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            message,
            notification_type,
            priority,
            sender_id,
            created_at: now,
            updated_at: now,
            scheduled_for: None,
            expires_at: None,
        }
    }

    /// Inside its scheduled/expiry window at `now`
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map_or(true, |s| s <= now) && self.expires_at.map_or(true, |e| e > now)
    }
}

/// A notification as seen by one recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub notification: Notification,
    pub is_read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_visibility_window() {
        let now = Utc::now();
        let mut n = Notification::new(
            "t".into(),
            "m".into(),
            NotificationType::Event,
            Priority::Low,
            Uuid::new_v4(),
        );
        assert!(n.is_visible_at(now));

        n.scheduled_for = Some(now + Duration::hours(1));
        assert!(!n.is_visible_at(now));

        n.scheduled_for = Some(now - Duration::hours(1));
        n.expires_at = Some(now);
        assert!(!n.is_visible_at(now));
    }
}
