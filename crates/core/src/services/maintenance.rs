//! Maintenance reporting and follow-up

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::required;
use super::rooms::settle_room;
use crate::error::{Error, Result};
use crate::listing::{MaintenanceFilter, Page};
use crate::models::{MaintenanceRecord, MaintenanceStatus, MaintenanceType, User};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::{Database, MaintenanceStore, RoomStore, UserStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaintenance {
    pub maintenance_type: MaintenanceType,
    pub description: String,
    pub scheduled_date: NaiveDate,
}

/// Log a maintenance request; the room goes under maintenance immediately
#[instrument(skip(db, actor, new), fields(actor = %actor.username))]
pub fn report(
    db: &mut Database,
    actor: &User,
    room_id: Uuid,
    new: &NewMaintenance,
) -> Result<MaintenanceRecord> {
    PermissionMatrix::require(actor, Capability::ReportMaintenance)?;
    let description = required(&new.description, "Description")?;

    let tx = db.write_tx()?;
    let room = RoomStore::new(&tx)
        .find_by_id(room_id)?
        .ok_or_else(|| Error::NotFound(format!("Room {}", room_id)))?;

    let record = MaintenanceRecord::new(
        room.id,
        new.maintenance_type,
        description,
        Some(actor.id),
        new.scheduled_date,
    );
    MaintenanceStore::new(&tx).create(&record)?;
    let occupancy = room.current_occupancy;
    let room = settle_room(&tx, room, occupancy)?;
    tx.commit()?;

    info!(record_id = %record.id, room = %room.number, "Maintenance reported");
    Ok(record)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceUpdate {
    pub status: MaintenanceStatus,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Move a record along; when the last open record for a room closes, the
/// room returns to the status its occupancy implies
#[instrument(skip(db, actor, update), fields(actor = %actor.username, status = %update.status.as_str()))]
pub fn update(
    db: &mut Database,
    actor: &User,
    record_id: Uuid,
    update: &MaintenanceUpdate,
) -> Result<MaintenanceRecord> {
    PermissionMatrix::require(actor, Capability::UpdateMaintenance)?;

    let tx = db.write_tx()?;
    let store = MaintenanceStore::new(&tx);
    let mut record = store
        .find_by_id(record_id)?
        .ok_or_else(|| Error::NotFound(format!("Maintenance record {}", record_id)))?;

    if let Some(assignee_id) = update.assigned_to {
        let assignee = UserStore::new(&tx)
            .find_by_id(assignee_id)?
            .ok_or_else(|| Error::Validation(format!("Unknown assignee {}", assignee_id)))?;
        if !PermissionMatrix::can_perform(assignee.role, Capability::ReceiveAssignments) {
            return Err(Error::Validation(format!(
                "{} cannot be assigned maintenance work",
                assignee.username
            )));
        }
        record.assigned_to = Some(assignee.id);
    }

    record.status = update.status;
    match record.status {
        MaintenanceStatus::Completed => {
            record.completion_date.get_or_insert_with(|| Utc::now().date_naive());
        }
        _ => record.completion_date = None,
    }
    if let Some(remarks) = &update.remarks {
        record.remarks = remarks.trim().to_string();
    }
    record.updated_at = Utc::now();
    store.update(&record)?;

    let room = RoomStore::new(&tx)
        .find_by_id(record.room_id)?
        .ok_or_else(|| Error::NotFound(format!("Room {}", record.room_id)))?;
    let occupancy = room.current_occupancy;
    let room = settle_room(&tx, room, occupancy)?;
    tx.commit()?;

    info!(record_id = %record.id, room_status = %room.status.as_str(), "Maintenance updated");
    Ok(record)
}

pub fn list(db: &Database, actor: &User, filter: &MaintenanceFilter) -> Result<Page<MaintenanceRecord>> {
    PermissionMatrix::require(actor, Capability::ViewMaintenance)?;
    db.maintenance().list(filter)
}
