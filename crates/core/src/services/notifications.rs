//! Notification fan-out, announcements and the per-user inbox

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::required;
use crate::error::{Error, Result};
use crate::listing::{NotificationFilter, Page};
use crate::models::{
    Complaint, Notification, NotificationType, NotificationView, Priority, Role, User,
};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::{AllocationStore, Database, NotificationStore, UserStore};

/// What happened to a complaint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintEvent {
    Created,
    Updated,
    Assigned,
    Resolved,
}

fn complaint_text(conn: &Connection, event: ComplaintEvent, complaint: &Complaint) -> Result<(String, String)> {
    let text = match event {
        ComplaintEvent::Created => (
            format!("New Complaint: {}", complaint.title),
            format!(
                "A new complaint has been reported regarding {}",
                complaint.category
            ),
        ),
        ComplaintEvent::Updated => (
            format!("Complaint Updated: {}", complaint.title),
            format!(
                "The complaint status has been updated to {}",
                complaint.status
            ),
        ),
        ComplaintEvent::Assigned => {
            let assignee = match complaint.assigned_to {
                Some(id) => UserStore::new(conn).find_by_id(id)?,
                None => None,
            };
            let name = assignee
                .map(|u| u.full_name())
                .unwrap_or_else(|| "nobody".to_string());
            (
                format!("Complaint Assigned: {}", complaint.title),
                format!("The complaint has been assigned to {}", name),
            )
        }
        ComplaintEvent::Resolved => (
            format!("Complaint Resolved: {}", complaint.title),
            "The complaint has been marked as resolved".to_string(),
        ),
    };
    Ok(text)
}

/// Reporter, assignee, then residents of the complaint's room; first
/// occurrence wins
fn complaint_recipients(conn: &Connection, complaint: &Complaint) -> Result<Vec<Uuid>> {
    let mut ids = vec![complaint.reported_by];
    ids.extend(complaint.assigned_to);
    if let Some(room_id) = complaint.room_id {
        ids.extend(AllocationStore::new(conn).active_students_in_room(room_id)?);
    }

    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
    Ok(ids)
}

/// Send the complaint notification for `event`. Runs on the caller's
/// connection so it joins any open transaction.
#[instrument(skip(conn, complaint, sender), fields(complaint_id = %complaint.id))]
pub fn notify(
    conn: &Connection,
    event: ComplaintEvent,
    complaint: &Complaint,
    sender: &User,
) -> Result<Notification> {
    let (title, message) = complaint_text(conn, event, complaint)?;
    let notification = Notification::new(
        title,
        message,
        NotificationType::Complaint,
        Priority::Medium,
        sender.id,
    );
    let recipients = complaint_recipients(conn, complaint)?;

    let store = NotificationStore::new(conn);
    store.create(&notification)?;
    store.add_recipients(notification.id, &recipients)?;

    debug!(notification_id = %notification.id, recipients = recipients.len(), "Complaint notification sent");
    Ok(notification)
}

/// Who an announcement goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Everyone,
    Role(Role),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: Priority,
    pub audience: Audience,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Broadcast to a role or to everyone. Returns the notification and how
/// many users received it.
#[instrument(skip(db, actor, announcement), fields(actor = %actor.username))]
pub fn announce(
    db: &mut Database,
    actor: &User,
    announcement: &Announcement,
) -> Result<(Notification, usize)> {
    PermissionMatrix::require(actor, Capability::SendAnnouncements)?;
    let title = required(&announcement.title, "Title")?;
    let message = required(&announcement.message, "Message")?;
    if let (Some(start), Some(end)) = (announcement.scheduled_for, announcement.expires_at) {
        if end <= start {
            return Err(Error::Validation("Expiry must be after the scheduled time".into()));
        }
    }

    let mut notification = Notification::new(
        title,
        message,
        announcement.notification_type,
        announcement.priority,
        actor.id,
    );
    notification.scheduled_for = announcement.scheduled_for;
    notification.expires_at = announcement.expires_at;

    let tx = db.write_tx()?;
    let role = match announcement.audience {
        Audience::Everyone => None,
        Audience::Role(role) => Some(role),
    };
    let recipients = UserStore::new(&tx).ids_by_role(role)?;
    let store = NotificationStore::new(&tx);
    store.create(&notification)?;
    store.add_recipients(notification.id, &recipients)?;
    tx.commit()?;

    info!(notification_id = %notification.id, recipients = recipients.len(), "Announcement sent");
    Ok((notification, recipients.len()))
}

/// Mark as read for `user`. Returns false, changing nothing, when the user
/// is not a recipient.
pub fn mark_read(db: &Database, user: &User, notification_id: Uuid) -> Result<bool> {
    let store = db.notifications();
    if store.find_by_id(notification_id)?.is_none() {
        return Err(Error::NotFound(format!("Notification {}", notification_id)));
    }
    if !store.is_recipient(notification_id, user.id)? {
        return Ok(false);
    }
    store.mark_read(notification_id, user.id, &Utc::now())?;
    Ok(true)
}

/// A page of the inbox plus how many of the filtered notifications are unread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    pub page: Page<NotificationView>,
    pub unread_count: u64,
}

pub fn inbox(db: &Database, user: &User, filter: &NotificationFilter) -> Result<Inbox> {
    PermissionMatrix::require(user, Capability::ReadNotifications)?;
    let now = Utc::now();
    Ok(Inbox {
        page: db.notifications().list_for_user(user.id, filter, &now)?,
        unread_count: db.notifications().unread_matching(user.id, filter, &now)?,
    })
}

pub fn unread_count(db: &Database, user: &User) -> Result<u64> {
    db.notifications().unread_count(user.id, &Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComplaintCategory, ComplaintStatus, RoomType};
    use crate::services::fixtures::{self, date};
    use crate::services::rooms::allocate;
    use chrono::Duration;

    fn filed(db: &Database, reporter: &User, room_id: Option<Uuid>) -> Complaint {
        let complaint = Complaint::new(
            "Cold showers".into(),
            "No hot water".into(),
            ComplaintCategory::Facility,
            room_id,
            reporter.id,
        );
        db.complaints().create(&complaint).unwrap();
        complaint
    }

    #[test]
    fn test_templates() {
        let db = fixtures::db();
        let amy = fixtures::user(&db, "amy", Role::Student);
        let mut bob = User::new("bob".into(), "hash".into(), Role::Staff);
        bob.set_full_name("Bob Builder");
        db.users().create(&bob).unwrap();

        let mut complaint = filed(&db, &amy, None);
        let conn = db.connection();

        let created = notify(conn, ComplaintEvent::Created, &complaint, &amy).unwrap();
        assert_eq!(created.title, "New Complaint: Cold showers");
        assert_eq!(created.message, "A new complaint has been reported regarding Facility");
        assert_eq!(created.notification_type, NotificationType::Complaint);
        assert_eq!(created.priority, Priority::Medium);

        complaint.status = ComplaintStatus::InProgress;
        let updated = notify(conn, ComplaintEvent::Updated, &complaint, &bob).unwrap();
        assert_eq!(updated.message, "The complaint status has been updated to In Progress");

        complaint.assigned_to = Some(bob.id);
        let assigned = notify(conn, ComplaintEvent::Assigned, &complaint, &bob).unwrap();
        assert_eq!(assigned.title, "Complaint Assigned: Cold showers");
        assert_eq!(assigned.message, "The complaint has been assigned to Bob Builder");

        let resolved = notify(conn, ComplaintEvent::Resolved, &complaint, &bob).unwrap();
        assert_eq!(resolved.title, "Complaint Resolved: Cold showers");
        assert_eq!(resolved.message, "The complaint has been marked as resolved");
    }

    #[test]
    fn test_recipients_cover_reporter_assignee_and_residents() {
        let mut db = fixtures::db();
        let staff = fixtures::user(&db, "warden", Role::Staff);
        let amy = fixtures::user(&db, "amy", Role::Student);
        let rory = fixtures::user(&db, "rory", Role::Student);
        let clara = fixtures::user(&db, "clara", Role::Student);
        let room = fixtures::room(&db, "101", RoomType::Triple);
        allocate(&mut db, &staff, room.id, amy.id, date(2024, 1, 1)).unwrap();
        allocate(&mut db, &staff, room.id, rory.id, date(2024, 1, 1)).unwrap();

        let mut complaint = filed(&db, &amy, Some(room.id));
        complaint.assigned_to = Some(staff.id);
        let n = notify(db.connection(), ComplaintEvent::Resolved, &complaint, &staff).unwrap();

        let recipients = db.notifications().recipients(n.id).unwrap();
        assert_eq!(recipients, vec![amy.id, staff.id, rory.id]);
        assert!(!recipients.contains(&clara.id));
    }

    #[test]
    fn test_resolved_always_reaches_reporter() {
        let db = fixtures::db();
        let amy = fixtures::user(&db, "amy", Role::Student);
        let complaint = filed(&db, &amy, None);
        let n = notify(db.connection(), ComplaintEvent::Resolved, &complaint, &amy).unwrap();
        assert_eq!(db.notifications().recipients(n.id).unwrap(), vec![amy.id]);
    }

    #[test]
    fn test_mark_read_by_non_recipient_has_no_effect() {
        let db = fixtures::db();
        let amy = fixtures::user(&db, "amy", Role::Student);
        let rory = fixtures::user(&db, "rory", Role::Student);
        let complaint = filed(&db, &amy, None);
        let n = notify(db.connection(), ComplaintEvent::Created, &complaint, &amy).unwrap();

        assert!(!mark_read(&db, &rory, n.id).unwrap());
        assert!(!db.notifications().is_read(n.id, rory.id).unwrap());
        assert_eq!(unread_count(&db, &amy).unwrap(), 1);

        assert!(mark_read(&db, &amy, n.id).unwrap());
        assert!(db.notifications().is_read(n.id, amy.id).unwrap());
        assert_eq!(unread_count(&db, &amy).unwrap(), 0);

        assert!(matches!(
            mark_read(&db, &amy, Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_inbox_unread_count_follows_filter() {
        let mut db = fixtures::db();
        let admin = fixtures::user(&db, "admin", Role::Admin);
        let amy = fixtures::user(&db, "amy", Role::Student);
        let complaint = filed(&db, &amy, None);
        notify(db.connection(), ComplaintEvent::Created, &complaint, &amy).unwrap();

        let drill = Announcement {
            title: "Fire drill".into(),
            message: "Friday at noon".into(),
            notification_type: NotificationType::Event,
            priority: Priority::High,
            audience: Audience::Everyone,
            scheduled_for: None,
            expires_at: None,
        };
        let (event, _) = announce(&mut db, &admin, &drill).unwrap();

        let events = NotificationFilter {
            notification_type: Some(NotificationType::Event),
            ..Default::default()
        };
        let inbox_before = inbox(&db, &amy, &events).unwrap();
        assert_eq!(inbox_before.page.total, 1);
        assert_eq!(inbox_before.unread_count, 1);

        assert!(mark_read(&db, &amy, event.id).unwrap());
        assert_eq!(inbox(&db, &amy, &events).unwrap().unread_count, 0);
        assert_eq!(inbox(&db, &amy, &NotificationFilter::default()).unwrap().unread_count, 1);
        assert_eq!(unread_count(&db, &amy).unwrap(), 1);
    }

    #[test]
    fn test_announce_to_role_and_window() {
        let mut db = fixtures::db();
        let admin = fixtures::user(&db, "admin", Role::Admin);
        let amy = fixtures::user(&db, "amy", Role::Student);
        let rory = fixtures::user(&db, "rory", Role::Student);
        let mum = fixtures::user(&db, "mum", Role::Parent);

        let notice = Announcement {
            title: "Fire drill".into(),
            message: "Friday at noon".into(),
            notification_type: NotificationType::Event,
            priority: Priority::High,
            audience: Audience::Role(Role::Student),
            scheduled_for: None,
            expires_at: None,
        };
        assert!(matches!(
            announce(&mut db, &amy, &notice),
            Err(Error::PermissionDenied(_))
        ));
        let (_, count) = announce(&mut db, &admin, &notice).unwrap();
        assert_eq!(count, 2);
        assert_eq!(unread_count(&db, &amy).unwrap(), 1);
        assert_eq!(unread_count(&db, &rory).unwrap(), 1);
        assert_eq!(unread_count(&db, &mum).unwrap(), 0);

        let later = Announcement {
            audience: Audience::Everyone,
            scheduled_for: Some(Utc::now() + Duration::hours(1)),
            ..notice.clone()
        };
        let (_, count) = announce(&mut db, &admin, &later).unwrap();
        assert_eq!(count, 4);
        assert_eq!(unread_count(&db, &mum).unwrap(), 0);

        let backwards = Announcement {
            expires_at: Some(Utc::now()),
            ..later
        };
        assert!(matches!(
            announce(&mut db, &admin, &backwards),
            Err(Error::Validation(_))
        ));

        let inbox = inbox(
            &db,
            &amy,
            &NotificationFilter {
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(inbox.page.total, 1);
        assert_eq!(inbox.unread_count, 1);
        assert!(!inbox.page.items[0].is_read);
    }
}
