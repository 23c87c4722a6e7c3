//! Request dispatch
//!
//! Maps each [`Request`] onto a core operation and the result onto a
//! [`Response`]. Runs synchronously against the database; the server calls
//! it from the blocking pool.

use tracing::{debug, error};

use hostel_core::services::{
    accounts, complaints, maintenance, notifications, payments, reports, rooms,
};
use hostel_core::{Database, Error as CoreError, Result as CoreResult, User};

use crate::protocol::{Request, Response};

/// What the connection should do with its session after a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    Keep,
    Set(String),
    Clear,
}

#[derive(Debug)]
pub struct Outcome {
    pub response: Response,
    pub session: SessionChange,
}

impl Outcome {
    fn reply(response: Response) -> Self {
        Self {
            response,
            session: SessionChange::Keep,
        }
    }
}

/// Turn a core error into an error response. Internal failures are logged
/// here and reported without detail.
pub fn error_response(err: &CoreError) -> Response {
    if err.is_user_facing() {
        debug!(kind = err.kind(), error = %err, "Request rejected");
        Response::error(err.kind(), err.to_string())
    } else {
        error!(error = %err, "Request failed");
        Response::error(err.kind(), "Internal server error")
    }
}

/// Handle one request for a connection holding `token`
pub fn handle(db: &mut Database, token: Option<&str>, request: Request, session_hours: i64) -> Outcome {
    match request {
        Request::Ping => Outcome::reply(Response::Pong),
        Request::Login { username, password } => {
            match accounts::login(db, &username, &password, session_hours) {
                Ok((user, session)) => Outcome {
                    response: Response::LoggedIn {
                        user,
                        token: session.token.clone(),
                        expires_at: session.expires_at,
                    },
                    session: SessionChange::Set(session.token),
                },
                Err(e) => Outcome::reply(error_response(&e)),
            }
        }
        request => {
            let Some(token) = token else {
                return Outcome::reply(Response::error(
                    "authentication",
                    "Login required",
                ));
            };
            let user = match accounts::authenticate(db, token) {
                Ok(user) => user,
                Err(e) => {
                    return Outcome {
                        response: error_response(&e),
                        session: SessionChange::Clear,
                    }
                }
            };
            if let Request::Logout = request {
                return match accounts::logout(db, token) {
                    Ok(()) => Outcome {
                        response: Response::LoggedOut,
                        session: SessionChange::Clear,
                    },
                    Err(e) => Outcome::reply(error_response(&e)),
                };
            }
            let revokes_session = matches!(request, Request::ChangePassword(_));
            match authed(db, &user, request) {
                Ok(response) if revokes_session => Outcome {
                    response,
                    session: SessionChange::Clear,
                },
                Ok(response) => Outcome::reply(response),
                Err(e) => Outcome::reply(error_response(&e)),
            }
        }
    }
}

fn authed(db: &mut Database, user: &User, request: Request) -> CoreResult<Response> {
    let response = match request {
        Request::Ping | Request::Login { .. } | Request::Logout => {
            return Err(CoreError::InvalidOperation(
                "Session routes are handled before dispatch".into(),
            ))
        }
        Request::WhoAmI => Response::User(user.clone()),
        Request::Dashboard => Response::Dashboard(reports::dashboard(db, user)?),

        Request::ListRooms { filter } => Response::Rooms(rooms::list_rooms(db, user, &filter)?),
        Request::RoomDetail { room_id } => {
            Response::RoomDetail(rooms::room_detail(db, user, room_id)?)
        }
        Request::CreateRoom(new) => Response::Room(rooms::create_room(db, user, &new)?),
        Request::SetRoomReserved { room_id, reserved } => {
            Response::Room(rooms::set_room_reserved(db, user, room_id, reserved)?)
        }
        Request::Allocate {
            room_id,
            student_id,
            check_in_date,
        } => Response::Allocation(rooms::allocate(db, user, room_id, student_id, check_in_date)?),
        Request::CheckOut {
            allocation_id,
            check_out_date,
        } => Response::Allocation(rooms::check_out(db, user, allocation_id, check_out_date)?),
        Request::ReportMaintenance { room_id, request } => {
            Response::Maintenance(maintenance::report(db, user, room_id, &request)?)
        }

        Request::ListStudents { filter } => {
            Response::Students(reports::list_students(db, user, &filter)?)
        }
        Request::StudentDetail { student_id } => {
            Response::Student(reports::student_detail(db, user, student_id)?)
        }

        Request::ListPayments { filter } => Response::Payments(payments::list(db, user, &filter)?),
        Request::CreatePayment(new) => Response::Payment(payments::create(db, user, &new)?),
        Request::RecordPayment {
            payment_id,
            receipt,
        } => Response::Payment(payments::record(db, user, payment_id, &receipt)?),

        Request::ListMaintenance { filter } => {
            Response::MaintenancePage(maintenance::list(db, user, &filter)?)
        }
        Request::UpdateMaintenance { record_id, update } => {
            Response::Maintenance(maintenance::update(db, user, record_id, &update)?)
        }

        Request::ListComplaints { filter } => {
            Response::Complaints(complaints::list(db, user, &filter)?)
        }
        Request::CreateComplaint(new) => Response::Complaint(complaints::create(db, user, &new)?),
        Request::ComplaintDetail { complaint_id } => {
            Response::ComplaintDetail(complaints::detail(db, user, complaint_id)?)
        }
        Request::UpdateComplaint {
            complaint_id,
            update,
        } => Response::Complaint(complaints::update(db, user, complaint_id, &update)?),

        Request::ListNotifications { filter } => {
            Response::Inbox(notifications::inbox(db, user, &filter)?)
        }
        Request::MarkNotificationRead { notification_id } => {
            if !notifications::mark_read(db, user, notification_id)? {
                return Err(CoreError::NotFound(format!(
                    "Notification {}",
                    notification_id
                )));
            }
            Response::MarkedRead { notification_id }
        }
        Request::UnreadCount => Response::UnreadCount {
            count: notifications::unread_count(db, user)?,
        },
        Request::Announce(announcement) => {
            let (notification, recipients) = notifications::announce(db, user, &announcement)?;
            Response::Announced {
                notification,
                recipients,
            }
        }

        Request::UpdateProfile(update) => {
            Response::User(accounts::update_profile(db, user, &update)?)
        }
        Request::ChangePassword(change) => {
            accounts::change_password(db, user, &change)?;
            Response::PasswordChanged
        }
        Request::GetPreferences => Response::Preferences(accounts::preferences(db, user)?),
        Request::SavePreferences(prefs) => {
            Response::Preferences(accounts::save_preferences(db, user, prefs)?)
        }

        Request::CreateUser(new) => Response::User(accounts::create_user(db, user, &new)?),
    };
    Ok(response)
}
