//! Dashboard and resident views

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::listing::{Page, StudentFilter};
use crate::models::{Allocation, Complaint, Money, Payment, Role, Room, User};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::{Database, MaintenanceCounts, RoomCounts};

/// How many recent payments and complaints the summaries show
pub const RECENT_LIMIT: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub rooms: RoomCounts,
    pub students: u64,
    pub maintenance: MaintenanceCounts,
    pub open_complaints: u64,
    pub total_collected: Money,
    pub recent_payments: Vec<Payment>,
    pub recent_complaints: Vec<Complaint>,
}

pub fn dashboard(db: &Database, actor: &User) -> Result<Dashboard> {
    PermissionMatrix::require(actor, Capability::ViewDashboard)?;
    Ok(Dashboard {
        rooms: db.rooms().counts()?,
        students: db.users().count_by_role(Role::Student)?,
        maintenance: db.maintenance().counts()?,
        open_complaints: db.complaints().count_open()?,
        total_collected: db.payments().total_collected()?,
        recent_payments: db.payments().list_recent(RECENT_LIMIT)?,
        recent_complaints: db.complaints().list_recent(RECENT_LIMIT)?,
    })
}

/// A student row with where they live now
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSummary {
    pub student: User,
    pub room: Option<Room>,
}

pub fn list_students(db: &Database, actor: &User, filter: &StudentFilter) -> Result<Page<StudentSummary>> {
    PermissionMatrix::require(actor, Capability::ViewStudents)?;
    let page = db
        .users()
        .list_students(filter.search.as_deref(), filter.page)?;

    let rooms = db.rooms();
    let mut current_rooms = Vec::with_capacity(page.items.len());
    for student in &page.items {
        current_rooms.push(rooms.find_current_for_student(student.id)?);
    }
    let mut current_rooms = current_rooms.into_iter();
    Ok(page.map(|student| StudentSummary {
        student,
        room: current_rooms.next().flatten(),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDetail {
    pub student: User,
    pub current_allocation: Option<Allocation>,
    pub current_room: Option<Room>,
    /// Latest check-in first
    pub allocations: Vec<Allocation>,
    pub recent_payments: Vec<Payment>,
    pub recent_complaints: Vec<Complaint>,
}

pub fn student_detail(db: &Database, actor: &User, student_id: Uuid) -> Result<StudentDetail> {
    PermissionMatrix::require(actor, Capability::ViewStudents)?;
    let student = db
        .users()
        .find_by_id(student_id)?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| Error::NotFound(format!("Student {}", student_id)))?;

    Ok(StudentDetail {
        current_allocation: db.allocations().find_active_for_student(student.id)?,
        current_room: db.rooms().find_current_for_student(student.id)?,
        allocations: db.allocations().list_for_student(student.id)?,
        recent_payments: db.payments().list_for_student(student.id, RECENT_LIMIT)?,
        recent_complaints: db.complaints().list_for_reporter(student.id, RECENT_LIMIT)?,
        student,
    })
}
