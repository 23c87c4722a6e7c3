//! Rooms and allocations
//!
//! Every path that changes occupancy or maintenance state ends in
//! [`settle_room`], which writes the occupancy together with the status
//! [`derive_status`] gives for it.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::required;
use crate::error::{Error, Result};
use crate::invariants::{assert_allocation_invariants, assert_id_valid, assert_room_invariants};
use crate::listing::RoomFilter;
use crate::models::{
    derive_status, Allocation, MaintenanceRecord, Money, Role, Room, RoomStatus, RoomType, User,
};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::{AllocationStore, Database, RoomCounts, RoomStore, UserStore};

/// Write `occupancy` and the status it implies for the room
pub(crate) fn settle_room(conn: &Connection, mut room: Room, occupancy: u32) -> Result<Room> {
    let rooms = RoomStore::new(conn);
    let has_open_maintenance = rooms.has_open_maintenance(room.id)?;
    room.current_occupancy = occupancy;
    room.status = derive_status(room.status, occupancy, room.capacity, has_open_maintenance);
    room.updated_at = Utc::now();
    rooms.update_occupancy(room.id, room.current_occupancy, room.status)?;
    assert_room_invariants(&room, has_open_maintenance);
    Ok(room)
}

fn load_room(rooms: &RoomStore<'_>, room_id: Uuid) -> Result<Room> {
    rooms
        .find_by_id(room_id)?
        .ok_or_else(|| Error::NotFound(format!("Room {}", room_id)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub number: String,
    pub floor: u32,
    pub room_type: RoomType,
    /// Defaults to the room type's capacity
    pub capacity: Option<u32>,
    pub monthly_rent: Money,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenities: Option<serde_json::Value>,
}

#[instrument(skip(db, actor, new), fields(number = %new.number))]
pub fn create_room(db: &Database, actor: &User, new: &NewRoom) -> Result<Room> {
    PermissionMatrix::require(actor, Capability::ManageRooms)?;

    let number = required(&new.number, "Room number")?;
    if new.monthly_rent.is_negative() {
        return Err(Error::Validation("Monthly rent cannot be negative".into()));
    }
    let capacity = new.capacity.unwrap_or_else(|| new.room_type.default_capacity());
    if capacity == 0 {
        return Err(Error::Validation("Capacity must be at least 1".into()));
    }
    if db.rooms().find_by_number(&number)?.is_some() {
        return Err(Error::Validation(format!("Room {} already exists", number)));
    }

    let mut room = Room::new(number, new.floor, new.room_type, new.monthly_rent);
    room.capacity = capacity;
    room.description = new.description.trim().to_string();
    if let Some(amenities) = &new.amenities {
        room.amenities = amenities.clone();
    }
    db.rooms().create(&room)?;

    info!(room_id = %room.id, "Room created");
    Ok(room)
}

/// Place or lift a manual reservation hold
#[instrument(skip(db, actor))]
pub fn set_room_reserved(db: &mut Database, actor: &User, room_id: Uuid, reserved: bool) -> Result<Room> {
    PermissionMatrix::require(actor, Capability::ManageRooms)?;

    let tx = db.write_tx()?;
    let mut room = load_room(&RoomStore::new(&tx), room_id)?;
    match (reserved, room.status) {
        (true, RoomStatus::Reserved) | (false, RoomStatus::Available | RoomStatus::Occupied) => {}
        (true, RoomStatus::Available) => room.status = RoomStatus::Reserved,
        (true, status) => {
            return Err(Error::InvalidOperation(format!(
                "Cannot reserve a room that is {}",
                status
            )));
        }
        (false, RoomStatus::Reserved) => room.status = RoomStatus::Available,
        (false, RoomStatus::Maintenance) => {
            return Err(Error::InvalidOperation(
                "Room is under maintenance, not reserved".into(),
            ));
        }
    }
    let occupancy = room.current_occupancy;
    let room = settle_room(&tx, room, occupancy)?;
    tx.commit()?;

    info!(room_id = %room.id, status = %room.status.as_str(), "Room reservation changed");
    Ok(room)
}

/// Check a student into a room
#[instrument(skip(db, actor), fields(actor = %actor.username))]
pub fn allocate(
    db: &mut Database,
    actor: &User,
    room_id: Uuid,
    student_id: Uuid,
    check_in_date: NaiveDate,
) -> Result<Allocation> {
    PermissionMatrix::require(actor, Capability::AllocateRooms)?;
    assert_id_valid(room_id, "allocate room");
    assert_id_valid(student_id, "allocate student");

    let tx = db.write_tx()?;
    let rooms = RoomStore::new(&tx);
    let allocations = AllocationStore::new(&tx);

    let room = load_room(&rooms, room_id)?;
    let student = UserStore::new(&tx)
        .find_by_id(student_id)?
        .ok_or_else(|| Error::Validation(format!("Unknown student {}", student_id)))?;
    if student.role != Role::Student {
        return Err(Error::Validation(format!(
            "{} is not a student",
            student.username
        )));
    }
    if !room.is_available() {
        return Err(Error::Validation(format!("{} is not available", room.label())));
    }
    if !room.has_space() {
        return Err(Error::Validation(format!("{} is at full capacity", room.label())));
    }
    if allocations.find_active_for_student(student_id)?.is_some() {
        return Err(Error::Validation(format!(
            "{} already has an active allocation",
            student.username
        )));
    }

    let allocation = Allocation::new(room.id, student.id, check_in_date);
    allocations.create(&allocation)?;
    assert_allocation_invariants(&allocation);
    let occupancy = room.current_occupancy + 1;
    let room = settle_room(&tx, room, occupancy)?;
    tx.commit()?;

    info!(
        allocation_id = %allocation.id,
        room = %room.number,
        occupancy = room.current_occupancy,
        status = %room.status.as_str(),
        "Student allocated"
    );
    Ok(allocation)
}

/// End an active allocation and free its place
#[instrument(skip(db, actor), fields(actor = %actor.username))]
pub fn check_out(
    db: &mut Database,
    actor: &User,
    allocation_id: Uuid,
    check_out_date: NaiveDate,
) -> Result<Allocation> {
    PermissionMatrix::require(actor, Capability::AllocateRooms)?;

    let tx = db.write_tx()?;
    let allocations = AllocationStore::new(&tx);
    let mut allocation = allocations
        .find_by_id(allocation_id)?
        .ok_or_else(|| Error::NotFound(format!("Allocation {}", allocation_id)))?;

    if !allocation.is_current() {
        return Err(Error::InvalidOperation("Allocation is already checked out".into()));
    }
    if check_out_date < allocation.check_in_date {
        return Err(Error::Validation(
            "Check-out date cannot precede check-in date".into(),
        ));
    }

    allocations.check_out(allocation.id, check_out_date)?;
    allocation.check_out_date = Some(check_out_date);
    allocation.is_active = false;
    allocation.updated_at = Utc::now();
    assert_allocation_invariants(&allocation);

    let room = load_room(&RoomStore::new(&tx), allocation.room_id)?;
    let occupancy = room.current_occupancy.saturating_sub(1);
    let room = settle_room(&tx, room, occupancy)?;
    tx.commit()?;

    info!(allocation_id = %allocation.id, room = %room.number, "Student checked out");
    Ok(allocation)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<Room>,
    pub counts: RoomCounts,
}

pub fn list_rooms(db: &Database, actor: &User, filter: &RoomFilter) -> Result<RoomList> {
    PermissionMatrix::require(actor, Capability::ViewRooms)?;
    Ok(RoomList {
        rooms: db.rooms().list(filter)?,
        counts: db.rooms().counts()?,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetail {
    pub room: Room,
    /// Newest first
    pub allocations: Vec<Allocation>,
    /// Newest first
    pub maintenance: Vec<MaintenanceRecord>,
}

pub fn room_detail(db: &Database, actor: &User, room_id: Uuid) -> Result<RoomDetail> {
    PermissionMatrix::require(actor, Capability::ViewRooms)?;
    Ok(RoomDetail {
        room: load_room(&db.rooms(), room_id)?,
        allocations: db.allocations().list_for_room(room_id)?,
        maintenance: db.maintenance().list_for_room(room_id)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{self, date};

    struct World {
        db: Database,
        admin: User,
        staff: User,
        amy: User,
        rory: User,
    }

    fn world() -> World {
        let db = fixtures::db();
        let admin = fixtures::user(&db, "admin", Role::Admin);
        let staff = fixtures::user(&db, "warden", Role::Staff);
        let amy = fixtures::user(&db, "amy", Role::Student);
        let rory = fixtures::user(&db, "rory", Role::Student);
        World { db, admin, staff, amy, rory }
    }

    fn allocation_count(db: &Database, room_id: Uuid) -> usize {
        db.allocations().list_for_room(room_id).unwrap().len()
    }

    #[test]
    fn test_allocate_fills_room_to_occupied() {
        let mut w = world();
        let room = fixtures::room(&w.db, "101", RoomType::Double);
        let clara = fixtures::user(&w.db, "clara", Role::Student);
        allocate(&mut w.db, &w.staff, room.id, clara.id, date(2023, 12, 1)).unwrap();

        let before = w.db.rooms().find_by_id(room.id).unwrap().unwrap();
        assert_eq!(before.current_occupancy, 1);
        assert_eq!(before.status, RoomStatus::Available);

        let allocation = allocate(&mut w.db, &w.staff, room.id, w.amy.id, date(2024, 1, 1)).unwrap();
        let after = w.db.rooms().find_by_id(room.id).unwrap().unwrap();
        assert_eq!(after.current_occupancy, 2);
        assert_eq!(after.status, RoomStatus::Occupied);

        let stored = w.db.allocations().find_by_id(allocation.id).unwrap().unwrap();
        assert_eq!(stored.room_id, room.id);
        assert_eq!(stored.student_id, w.amy.id);
        assert_eq!(stored.check_in_date, date(2024, 1, 1));
        assert!(stored.is_active);
    }

    #[test]
    fn test_allocate_rejections_leave_no_trace() {
        let mut w = world();
        let single = fixtures::room(&w.db, "101", RoomType::Single);
        allocate(&mut w.db, &w.staff, single.id, w.amy.id, date(2024, 1, 1)).unwrap();

        // occupied
        let err = allocate(&mut w.db, &w.staff, single.id, w.rory.id, date(2024, 1, 2)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(allocation_count(&w.db, single.id), 1);
        assert_eq!(w.db.rooms().find_by_id(single.id).unwrap().unwrap().current_occupancy, 1);

        // already housed elsewhere
        let double = fixtures::room(&w.db, "102", RoomType::Double);
        let err = allocate(&mut w.db, &w.staff, double.id, w.amy.id, date(2024, 1, 2)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(allocation_count(&w.db, double.id), 0);

        // not a student
        let err = allocate(&mut w.db, &w.admin, double.id, w.staff.id, date(2024, 1, 2)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // unknown room
        let err = allocate(&mut w.db, &w.staff, Uuid::new_v4(), w.rory.id, date(2024, 1, 2)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // students may not allocate
        let err = allocate(&mut w.db, &w.rory, double.id, w.rory.id, date(2024, 1, 2)).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert_eq!(w.db.rooms().find_by_id(double.id).unwrap().unwrap().current_occupancy, 0);
    }

    #[test]
    fn test_allocate_into_full_but_available_room_rejected() {
        let mut w = world();
        let mut room = Room::new("103".into(), 1, RoomType::Single, Money::ZERO);
        room.current_occupancy = 1;
        w.db.rooms().create(&room).unwrap();

        let err = allocate(&mut w.db, &w.staff, room.id, w.amy.id, date(2024, 1, 1)).unwrap_err();
        assert!(err.to_string().contains("full capacity"));
        assert_eq!(allocation_count(&w.db, room.id), 0);
    }

    #[test]
    fn test_check_out_restores_availability() {
        let mut w = world();
        let room = fixtures::room(&w.db, "101", RoomType::Single);
        let allocation = allocate(&mut w.db, &w.staff, room.id, w.amy.id, date(2024, 1, 1)).unwrap();

        let err = check_out(&mut w.db, &w.staff, allocation.id, date(2023, 12, 31)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let done = check_out(&mut w.db, &w.staff, allocation.id, date(2024, 6, 30)).unwrap();
        assert!(!done.is_active);
        let room = w.db.rooms().find_by_id(room.id).unwrap().unwrap();
        assert_eq!(room.current_occupancy, 0);
        assert_eq!(room.status, RoomStatus::Available);
        assert!(w.db.allocations().find_active_for_student(w.amy.id).unwrap().is_none());

        let err = check_out(&mut w.db, &w.staff, allocation.id, date(2024, 7, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        // free to move again
        allocate(&mut w.db, &w.staff, room.id, w.amy.id, date(2024, 7, 1)).unwrap();
    }

    #[test]
    fn test_create_room_and_reservation() {
        let mut w = world();
        let new = NewRoom {
            number: " 201 ".into(),
            floor: 2,
            room_type: RoomType::Triple,
            capacity: None,
            monthly_rent: Money::from_cents(25_000),
            description: String::new(),
            amenities: Some(serde_json::json!(["wifi"])),
        };
        assert!(matches!(
            create_room(&w.db, &w.staff, &new),
            Err(Error::PermissionDenied(_))
        ));
        let room = create_room(&w.db, &w.admin, &new).unwrap();
        assert_eq!(room.number, "201");
        assert_eq!(room.capacity, 3);
        assert!(matches!(create_room(&w.db, &w.admin, &new), Err(Error::Validation(_))));

        let reserved = set_room_reserved(&mut w.db, &w.admin, room.id, true).unwrap();
        assert_eq!(reserved.status, RoomStatus::Reserved);
        assert!(allocate(&mut w.db, &w.staff, room.id, w.amy.id, date(2024, 1, 1)).is_err());

        let released = set_room_reserved(&mut w.db, &w.admin, room.id, false).unwrap();
        assert_eq!(released.status, RoomStatus::Available);
        allocate(&mut w.db, &w.staff, room.id, w.amy.id, date(2024, 1, 1)).unwrap();
    }

    #[test]
    fn test_room_list_and_detail() {
        let mut w = world();
        let a = fixtures::room(&w.db, "101", RoomType::Single);
        fixtures::room(&w.db, "102", RoomType::Single);
        allocate(&mut w.db, &w.staff, a.id, w.amy.id, date(2024, 1, 1)).unwrap();

        let parent = fixtures::user(&w.db, "mum", Role::Parent);
        let list = list_rooms(
            &w.db,
            &parent,
            &RoomFilter {
                status: Some(RoomStatus::Available),
            },
        )
        .unwrap();
        assert_eq!(list.rooms.len(), 1);
        assert_eq!(list.rooms[0].number, "102");
        assert_eq!(list.counts.total, 2);
        assert_eq!(list.counts.occupied, 1);

        let detail = room_detail(&w.db, &parent, a.id).unwrap();
        assert_eq!(detail.allocations.len(), 1);
        assert!(detail.maintenance.is_empty());
        assert!(matches!(
            room_detail(&w.db, &parent, Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }
}
