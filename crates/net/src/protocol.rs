//! Network protocol message types
//!
//! Every frame carries one JSON object. Clients send a [`Request`] tagged by
//! `route`; the server answers each with exactly one [`Response`] tagged by
//! `type`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hostel_core::services::accounts::{NewUser, PasswordChange, ProfileUpdate};
use hostel_core::services::complaints::{ComplaintDetail, ComplaintUpdate, NewComplaint};
use hostel_core::services::maintenance::{MaintenanceUpdate, NewMaintenance};
use hostel_core::services::notifications::{Announcement, Inbox};
use hostel_core::services::payments::{NewPayment, PaymentReceipt};
use hostel_core::services::reports::{Dashboard, StudentDetail, StudentSummary};
use hostel_core::services::rooms::{NewRoom, RoomDetail, RoomList};
use hostel_core::{
    Allocation, Complaint, ComplaintFilter, MaintenanceFilter, MaintenanceRecord, Notification,
    NotificationFilter, NotificationPreferences, Page, Payment, PaymentFilter, Room, RoomFilter,
    StudentFilter, User,
};

/// Client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Request {
    /// Liveness check, allowed without a session
    Ping,

    // Session
    Login { username: String, password: String },
    Logout,
    WhoAmI,

    // Dashboard
    Dashboard,

    // Rooms
    ListRooms {
        #[serde(default)]
        filter: RoomFilter,
    },
    RoomDetail { room_id: Uuid },
    CreateRoom(NewRoom),
    SetRoomReserved { room_id: Uuid, reserved: bool },
    Allocate {
        room_id: Uuid,
        student_id: Uuid,
        check_in_date: NaiveDate,
    },
    CheckOut {
        allocation_id: Uuid,
        check_out_date: NaiveDate,
    },
    ReportMaintenance {
        room_id: Uuid,
        request: NewMaintenance,
    },

    // Students
    ListStudents {
        #[serde(default)]
        filter: StudentFilter,
    },
    StudentDetail { student_id: Uuid },

    // Payments
    ListPayments {
        #[serde(default)]
        filter: PaymentFilter,
    },
    CreatePayment(NewPayment),
    RecordPayment {
        payment_id: Uuid,
        receipt: PaymentReceipt,
    },

    // Maintenance
    ListMaintenance {
        #[serde(default)]
        filter: MaintenanceFilter,
    },
    UpdateMaintenance {
        record_id: Uuid,
        update: MaintenanceUpdate,
    },

    // Complaints
    ListComplaints {
        #[serde(default)]
        filter: ComplaintFilter,
    },
    CreateComplaint(NewComplaint),
    ComplaintDetail { complaint_id: Uuid },
    UpdateComplaint {
        complaint_id: Uuid,
        update: ComplaintUpdate,
    },

    // Notifications
    ListNotifications {
        #[serde(default)]
        filter: NotificationFilter,
    },
    MarkNotificationRead { notification_id: Uuid },
    UnreadCount,
    Announce(Announcement),

    // Settings
    UpdateProfile(ProfileUpdate),
    ChangePassword(PasswordChange),
    GetPreferences,
    SavePreferences(NotificationPreferences),

    // Administration
    CreateUser(NewUser),
}

impl Request {
    /// Route name as it appears on the wire
    pub fn route(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Login { .. } => "login",
            Request::Logout => "logout",
            Request::WhoAmI => "who_am_i",
            Request::Dashboard => "dashboard",
            Request::ListRooms { .. } => "list_rooms",
            Request::RoomDetail { .. } => "room_detail",
            Request::CreateRoom(_) => "create_room",
            Request::SetRoomReserved { .. } => "set_room_reserved",
            Request::Allocate { .. } => "allocate",
            Request::CheckOut { .. } => "check_out",
            Request::ReportMaintenance { .. } => "report_maintenance",
            Request::ListStudents { .. } => "list_students",
            Request::StudentDetail { .. } => "student_detail",
            Request::ListPayments { .. } => "list_payments",
            Request::CreatePayment(_) => "create_payment",
            Request::RecordPayment { .. } => "record_payment",
            Request::ListMaintenance { .. } => "list_maintenance",
            Request::UpdateMaintenance { .. } => "update_maintenance",
            Request::ListComplaints { .. } => "list_complaints",
            Request::CreateComplaint(_) => "create_complaint",
            Request::ComplaintDetail { .. } => "complaint_detail",
            Request::UpdateComplaint { .. } => "update_complaint",
            Request::ListNotifications { .. } => "list_notifications",
            Request::MarkNotificationRead { .. } => "mark_notification_read",
            Request::UnreadCount => "unread_count",
            Request::Announce(_) => "announce",
            Request::UpdateProfile(_) => "update_profile",
            Request::ChangePassword(_) => "change_password",
            Request::GetPreferences => "get_preferences",
            Request::SavePreferences(_) => "save_preferences",
            Request::CreateUser(_) => "create_user",
        }
    }
}

/// Server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    LoggedIn {
        user: User,
        token: String,
        expires_at: DateTime<Utc>,
    },
    LoggedOut,
    User(User),
    Dashboard(Dashboard),
    Rooms(RoomList),
    Room(Room),
    RoomDetail(RoomDetail),
    Allocation(Allocation),
    Maintenance(MaintenanceRecord),
    MaintenancePage(Page<MaintenanceRecord>),
    Students(Page<StudentSummary>),
    Student(StudentDetail),
    Payments(Page<Payment>),
    Payment(Payment),
    Complaints(Page<Complaint>),
    Complaint(Complaint),
    ComplaintDetail(ComplaintDetail),
    Inbox(Inbox),
    MarkedRead { notification_id: Uuid },
    UnreadCount { count: u64 },
    Announced {
        notification: Notification,
        recipients: usize,
    },
    Preferences(NotificationPreferences),
    PasswordChanged,
    Error { kind: String, message: String },
}

impl Response {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Response::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_value(Request::MarkNotificationRead {
            notification_id: Uuid::nil(),
        })
        .unwrap();
        assert_eq!(json["route"], "mark_notification_read");
        assert_eq!(json["notification_id"], Uuid::nil().to_string());

        let ping: Request = serde_json::from_str(r#"{"route":"ping"}"#).unwrap();
        assert!(matches!(ping, Request::Ping));
    }

    #[test]
    fn test_filters_default_when_omitted() {
        let req: Request = serde_json::from_str(r#"{"route":"list_complaints"}"#).unwrap();
        match req {
            Request::ListComplaints { filter } => {
                assert!(filter.status.is_none());
                assert!(filter.page.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let req: Request = serde_json::from_str(
            r#"{"route":"list_notifications","filter":{"unread_only":true,"page":2}}"#,
        )
        .unwrap();
        assert_eq!(req.route(), "list_notifications");
        match req {
            Request::ListNotifications { filter } => {
                assert!(filter.unread_only);
                assert_eq!(filter.page, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_newtype_route_flattens_payload() {
        let req: Request = serde_json::from_str(
            r#"{"route":"create_complaint","title":"Leak","description":"Ceiling","category":"facility"}"#,
        )
        .unwrap();
        match req {
            Request::CreateComplaint(new) => {
                assert_eq!(new.title, "Leak");
                assert!(new.room_id.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(Response::error("not_found", "Room 7")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["message"], "Room 7");
    }

    #[test]
    fn test_user_hash_never_sent() {
        let user = User::new("amy".into(), "secret-hash".into(), hostel_core::Role::Student);
        let text = serde_json::to_string(&Response::User(user)).unwrap();
        assert!(!text.contains("secret-hash"));
    }
}
