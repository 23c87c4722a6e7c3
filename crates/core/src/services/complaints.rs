//! Complaint filing, triage and resolution

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::notifications::{notify, ComplaintEvent};
use super::required;
use crate::error::{Error, Result};
use crate::invariants::assert_complaint_invariants;
use crate::listing::{ComplaintFilter, Page};
use crate::models::{Complaint, ComplaintCategory, ComplaintStatus, Room, User};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::{ComplaintStore, Database, RoomStore, UserStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    #[serde(default)]
    pub room_id: Option<Uuid>,
}

/// File a complaint and notify everyone concerned
#[instrument(skip(db, actor, new), fields(actor = %actor.username))]
pub fn create(db: &mut Database, actor: &User, new: &NewComplaint) -> Result<Complaint> {
    PermissionMatrix::require(actor, Capability::FileComplaints)?;
    let title = required(&new.title, "Title")?;
    let description = required(&new.description, "Description")?;

    let tx = db.write_tx()?;
    if let Some(room_id) = new.room_id {
        if RoomStore::new(&tx).find_by_id(room_id)?.is_none() {
            return Err(Error::Validation(format!("Unknown room {}", room_id)));
        }
    }

    let complaint = Complaint::new(title, description, new.category, new.room_id, actor.id);
    ComplaintStore::new(&tx).create(&complaint)?;
    notify(&tx, ComplaintEvent::Created, &complaint, actor)?;
    tx.commit()?;

    info!(complaint_id = %complaint.id, "Complaint filed");
    Ok(complaint)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintUpdate {
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Change status, assignment or resolution.
///
/// Staff may touch any complaint, reporters only their own, and only staff
/// may assign. A new assignee triggers an "assigned" notification; a status
/// change triggers "resolved" for resolved/closed and "updated" otherwise.
#[instrument(skip(db, actor, update), fields(actor = %actor.username))]
pub fn update(
    db: &mut Database,
    actor: &User,
    complaint_id: Uuid,
    update: &ComplaintUpdate,
) -> Result<Complaint> {
    let tx = db.write_tx()?;
    let store = ComplaintStore::new(&tx);
    let mut complaint = store
        .find_by_id(complaint_id)?
        .ok_or_else(|| Error::NotFound(format!("Complaint {}", complaint_id)))?;

    if !PermissionMatrix::can_update_complaint(actor, complaint.reported_by) {
        return Err(Error::PermissionDenied(
            "Only staff or the reporter may update this complaint".into(),
        ));
    }

    let old_status = complaint.status;
    let old_assignee = complaint.assigned_to;

    if let Some(assignee_id) = update.assigned_to {
        PermissionMatrix::require(actor, Capability::ManageComplaints)?;
        let assignee = UserStore::new(&tx)
            .find_by_id(assignee_id)?
            .ok_or_else(|| Error::Validation(format!("Unknown assignee {}", assignee_id)))?;
        if !PermissionMatrix::can_perform(assignee.role, Capability::ReceiveAssignments) {
            return Err(Error::Validation(format!(
                "{} cannot be assigned complaints",
                assignee.username
            )));
        }
        complaint.assigned_to = Some(assignee.id);
    }

    if let Some(status) = update.status {
        complaint.status = status;
    }
    if complaint.status.is_terminal() {
        // Resolution text is only taken when the complaint is resolved or closed
        if let Some(resolution) = &update.resolution {
            complaint.resolution = Some(resolution.trim().to_string()).filter(|r| !r.is_empty());
        }
        complaint.resolved_at.get_or_insert_with(Utc::now);
    } else {
        complaint.resolved_at = None;
    }
    complaint.updated_at = Utc::now();
    assert_complaint_invariants(&complaint);
    store.update(&complaint)?;

    if complaint.assigned_to != old_assignee {
        notify(&tx, ComplaintEvent::Assigned, &complaint, actor)?;
    }
    if complaint.status != old_status {
        let event = if complaint.status.is_terminal() {
            ComplaintEvent::Resolved
        } else {
            ComplaintEvent::Updated
        };
        notify(&tx, event, &complaint, actor)?;
    }
    tx.commit()?;

    info!(
        complaint_id = %complaint.id,
        from = %old_status.as_str(),
        to = %complaint.status.as_str(),
        "Complaint updated"
    );
    Ok(complaint)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintDetail {
    pub complaint: Complaint,
    pub reporter: Option<User>,
    pub assignee: Option<User>,
    pub room: Option<Room>,
}

pub fn detail(db: &Database, actor: &User, complaint_id: Uuid) -> Result<ComplaintDetail> {
    PermissionMatrix::require(actor, Capability::ViewComplaints)?;
    let complaint = db
        .complaints()
        .find_by_id(complaint_id)?
        .ok_or_else(|| Error::NotFound(format!("Complaint {}", complaint_id)))?;

    let users = db.users();
    let assignee = match complaint.assigned_to {
        Some(id) => users.find_by_id(id)?,
        None => None,
    };
    let room = match complaint.room_id {
        Some(id) => db.rooms().find_by_id(id)?,
        None => None,
    };
    Ok(ComplaintDetail {
        reporter: users.find_by_id(complaint.reported_by)?,
        assignee,
        room,
        complaint,
    })
}

pub fn list(db: &Database, actor: &User, filter: &ComplaintFilter) -> Result<Page<Complaint>> {
    PermissionMatrix::require(actor, Capability::ViewComplaints)?;
    db.complaints().list(filter)
}
