//! Room and allocation models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Money;

choice_enum! {
    pub enum RoomType {
        Single => ("single", "Single"),
        Double => ("double", "Double"),
        Triple => ("triple", "Triple"),
        Quad => ("quad", "Quad"),
    }
}

impl RoomType {
    /// Beds a room of this type normally holds
    pub fn default_capacity(&self) -> u32 {
        match self {
            RoomType::Single => 1,
            RoomType::Double => 2,
            RoomType::Triple => 3,
            RoomType::Quad => 4,
        }
    }
}

choice_enum! {
    pub enum RoomStatus {
        Available => ("available", "Available"),
        Occupied => ("occupied", "Occupied"),
        Maintenance => ("maintenance", "Under Maintenance"),
        Reserved => ("reserved", "Reserved"),
    }
}

/// Compute a room's status from its occupancy and holds.
///
/// Open maintenance wins over everything, then a manual reservation, then
/// occupancy decides between occupied and available.
pub fn derive_status(
    current: RoomStatus,
    occupancy: u32,
    capacity: u32,
    has_open_maintenance: bool,
) -> RoomStatus {
    if has_open_maintenance {
        RoomStatus::Maintenance
    } else if current == RoomStatus::Reserved {
        RoomStatus::Reserved
    } else if occupancy >= capacity {
        RoomStatus::Occupied
    } else {
        RoomStatus::Available
    }
}

/// A bookable room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub number: String,
    pub floor: u32,
    pub room_type: RoomType,
    pub capacity: u32,
    pub current_occupancy: u32,
    pub status: RoomStatus,
    pub monthly_rent: Money,
    pub description: String,
    pub amenities: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(number: String, floor: u32, room_type: RoomType, monthly_rent: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number,
            floor,
            room_type,
            capacity: room_type.default_capacity(),
            current_occupancy: 0,
            status: RoomStatus::Available,
            monthly_rent,
            description: String::new(),
            amenities: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == RoomStatus::Available
    }

    pub fn has_space(&self) -> bool {
        self.current_occupancy < self.capacity
    }

    pub fn label(&self) -> String {
        format!("Room {} ({})", self.number, self.room_type)
    }
}

/// A student's stay in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub room_id: Uuid,
    pub student_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    pub fn new(room_id: Uuid, student_id: Uuid, check_in_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            room_id,
            student_id,
            check_in_date,
            check_out_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active means checked in and not yet checked out
    pub fn is_current(&self) -> bool {
        self.is_active && self.check_out_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_status_from_occupancy() {
        assert_eq!(derive_status(RoomStatus::Available, 1, 2, false), RoomStatus::Available);
        assert_eq!(derive_status(RoomStatus::Available, 2, 2, false), RoomStatus::Occupied);
        assert_eq!(derive_status(RoomStatus::Occupied, 1, 2, false), RoomStatus::Available);
    }

    #[test]
    fn test_derive_status_holds() {
        assert_eq!(derive_status(RoomStatus::Occupied, 2, 2, true), RoomStatus::Maintenance);
        assert_eq!(derive_status(RoomStatus::Reserved, 0, 2, false), RoomStatus::Reserved);
        assert_eq!(derive_status(RoomStatus::Maintenance, 0, 2, false), RoomStatus::Available);
    }

    #[test]
    fn test_new_room_capacity_from_type() {
        let room = Room::new("101".into(), 1, RoomType::Triple, Money::from_cents(50_000));
        assert_eq!(room.capacity, 3);
        assert!(room.is_available());
        assert!(room.has_space());
        assert_eq!(room.label(), "Room 101 (Triple)");
    }
}
