//! Room storage operations

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::filter::SqlFilter;
use super::parse::{fmt_datetime, parse_choice, parse_datetime, parse_json, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::listing::RoomFilter;
use crate::models::{Money, Room, RoomStatus, RoomType};

const ROOM_COLUMNS: &str = "r.id, r.number, r.floor, r.room_type, r.capacity, r.current_occupancy, \
     r.status, r.monthly_rent, r.description, r.amenities, r.created_at, r.updated_at";

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        number: row.get(1)?,
        floor: row.get(2)?,
        room_type: parse_choice(&row.get::<_, String>(3)?, RoomType::from_str)?,
        capacity: row.get(4)?,
        current_occupancy: row.get(5)?,
        status: parse_choice(&row.get::<_, String>(6)?, RoomStatus::from_str)?,
        monthly_rent: Money::from_cents(row.get(7)?),
        description: row.get(8)?,
        amenities: parse_json(&row.get::<_, String>(9)?)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}

/// Room counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCounts {
    pub total: u64,
    pub available: u64,
    pub occupied: u64,
    pub maintenance: u64,
    pub reserved: u64,
}

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new room
    #[instrument(skip(self, room), fields(number = %room.number))]
    pub fn create(&self, room: &Room) -> Result<()> {
        self.conn.execute(
            "INSERT INTO rooms (id, number, floor, room_type, capacity, current_occupancy, status,
                                monthly_rent, description, amenities, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                room.id.to_string(),
                room.number,
                room.floor,
                room.room_type.as_str(),
                room.capacity,
                room.current_occupancy,
                room.status.as_str(),
                room.monthly_rent.cents(),
                room.description,
                serde_json::to_string(&room.amenities)?,
                fmt_datetime(&room.created_at),
                fmt_datetime(&room.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Find room by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let room = self
            .conn
            .query_row(
                &format!("SELECT {} FROM rooms r WHERE r.id = ?1", ROOM_COLUMNS),
                params![id.to_string()],
                room_from_row,
            )
            .optional()?;
        Ok(room)
    }

    /// Find room by its number
    #[instrument(skip(self))]
    pub fn find_by_number(&self, number: &str) -> Result<Option<Room>> {
        let room = self
            .conn
            .query_row(
                &format!("SELECT {} FROM rooms r WHERE r.number = ?1", ROOM_COLUMNS),
                params![number],
                room_from_row,
            )
            .optional()?;
        Ok(room)
    }

    /// Room the student currently lives in, if any
    pub fn find_current_for_student(&self, student_id: Uuid) -> Result<Option<Room>> {
        let room = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM rooms r
                     INNER JOIN allocations a ON a.room_id = r.id
                     WHERE a.student_id = ?1 AND a.is_active = 1 AND a.check_out_date IS NULL",
                    ROOM_COLUMNS
                ),
                params![student_id.to_string()],
                room_from_row,
            )
            .optional()?;
        Ok(room)
    }

    /// All rooms ordered by floor then number
    #[instrument(skip(self))]
    pub fn list(&self, filter: &RoomFilter) -> Result<Vec<Room>> {
        let filter = SqlFilter::new().eq("r.status", filter.status.map(|s| s.as_str()));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM rooms r{} ORDER BY r.floor, r.number",
            ROOM_COLUMNS,
            filter.where_sql()
        ))?;
        let rooms = stmt
            .query_map(params_from_iter(filter.params()), room_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    /// Counts of rooms per status
    pub fn counts(&self) -> Result<RoomCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM rooms GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    parse_choice(&row.get::<_, String>(0)?, RoomStatus::from_str)?,
                    row.get::<_, i64>(1)? as u64,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = RoomCounts::default();
        for (status, n) in rows {
            counts.total += n;
            match status {
                RoomStatus::Available => counts.available = n,
                RoomStatus::Occupied => counts.occupied = n,
                RoomStatus::Maintenance => counts.maintenance = n,
                RoomStatus::Reserved => counts.reserved = n,
            }
        }
        Ok(counts)
    }

    /// Write occupancy and status together
    #[instrument(skip(self))]
    pub fn update_occupancy(&self, room_id: Uuid, occupancy: u32, status: RoomStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET current_occupancy = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                occupancy,
                status.as_str(),
                fmt_datetime(&Utc::now()),
                room_id.to_string()
            ],
        )?;
        Ok(())
    }

    /// Number of allocations still checked in to the room
    pub fn count_active_allocations(&self, room_id: Uuid) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM allocations
             WHERE room_id = ?1 AND is_active = 1 AND check_out_date IS NULL",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Whether pending or in-progress maintenance exists for the room
    pub fn has_open_maintenance(&self, room_id: Uuid) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM maintenance_records
                           WHERE room_id = ?1 AND status IN ('pending', 'in_progress'))",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
