//! Allocation storage operations

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{fmt_date, fmt_datetime, parse_date, parse_date_opt, parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Allocation;

const ALLOCATION_COLUMNS: &str = "a.id, a.room_id, a.student_id, a.check_in_date, a.check_out_date, \
     a.is_active, a.created_at, a.updated_at";

fn allocation_from_row(row: &Row<'_>) -> rusqlite::Result<Allocation> {
    Ok(Allocation {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        room_id: parse_uuid(&row.get::<_, String>(1)?)?,
        student_id: parse_uuid(&row.get::<_, String>(2)?)?,
        check_in_date: parse_date(&row.get::<_, String>(3)?)?,
        check_out_date: parse_date_opt(row.get::<_, Option<String>>(4)?)?,
        is_active: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

pub struct AllocationStore<'a> {
    conn: &'a Connection,
}

impl<'a> AllocationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a check-in
    #[instrument(skip(self, allocation), fields(room_id = %allocation.room_id, student_id = %allocation.student_id))]
    pub fn create(&self, allocation: &Allocation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO allocations (id, room_id, student_id, check_in_date, check_out_date, is_active,
                                      created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                allocation.id.to_string(),
                allocation.room_id.to_string(),
                allocation.student_id.to_string(),
                fmt_date(&allocation.check_in_date),
                allocation.check_out_date.as_ref().map(fmt_date),
                allocation.is_active,
                fmt_datetime(&allocation.created_at),
                fmt_datetime(&allocation.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Find allocation by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Allocation>> {
        let allocation = self
            .conn
            .query_row(
                &format!("SELECT {} FROM allocations a WHERE a.id = ?1", ALLOCATION_COLUMNS),
                params![id.to_string()],
                allocation_from_row,
            )
            .optional()?;
        Ok(allocation)
    }

    /// The student's current allocation
    pub fn find_active_for_student(&self, student_id: Uuid) -> Result<Option<Allocation>> {
        let allocation = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM allocations a
                     WHERE a.student_id = ?1 AND a.is_active = 1 AND a.check_out_date IS NULL",
                    ALLOCATION_COLUMNS
                ),
                params![student_id.to_string()],
                allocation_from_row,
            )
            .optional()?;
        Ok(allocation)
    }

    /// Allocation history for a room, newest first
    pub fn list_for_room(&self, room_id: Uuid) -> Result<Vec<Allocation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM allocations a WHERE a.room_id = ?1
             ORDER BY a.created_at DESC, a.rowid DESC",
            ALLOCATION_COLUMNS
        ))?;
        let allocations = stmt
            .query_map(params![room_id.to_string()], allocation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(allocations)
    }

    /// Allocation history for a student by check-in date, newest first
    pub fn list_for_student(&self, student_id: Uuid) -> Result<Vec<Allocation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM allocations a WHERE a.student_id = ?1
             ORDER BY a.check_in_date DESC, a.rowid DESC",
            ALLOCATION_COLUMNS
        ))?;
        let allocations = stmt
            .query_map(params![student_id.to_string()], allocation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(allocations)
    }

    /// Students currently checked in to the room
    pub fn active_students_in_room(&self, room_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT student_id FROM allocations
             WHERE room_id = ?1 AND is_active = 1 AND check_out_date IS NULL",
        )?;
        let ids = stmt
            .query_map(params![room_id.to_string()], |row| {
                parse_uuid(&row.get::<_, String>(0)?)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Close an allocation
    #[instrument(skip(self))]
    pub fn check_out(&self, allocation_id: Uuid, check_out_date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "UPDATE allocations SET check_out_date = ?1, is_active = 0, updated_at = ?2 WHERE id = ?3",
            params![
                fmt_date(&check_out_date),
                fmt_datetime(&Utc::now()),
                allocation_id.to_string()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, Role, Room, RoomType, User};
    use crate::storage::Database;

    fn setup() -> (Database, Room, User) {
        let db = Database::open_in_memory().unwrap();
        let room = Room::new("101".into(), 1, RoomType::Double, Money::from_cents(1));
        db.rooms().create(&room).unwrap();
        let student = User::new("sam".into(), "hash".into(), Role::Student);
        db.users().create(&student).unwrap();
        (db, room, student)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_active_allocation_lookup() {
        let (db, room, student) = setup();
        let allocation = Allocation::new(room.id, student.id, date(2024, 1, 1));
        db.allocations().create(&allocation).unwrap();

        let active = db.allocations().find_active_for_student(student.id).unwrap().unwrap();
        assert_eq!(active.id, allocation.id);
        assert_eq!(db.allocations().active_students_in_room(room.id).unwrap(), vec![student.id]);

        db.allocations().check_out(allocation.id, date(2024, 6, 1)).unwrap();
        assert!(db.allocations().find_active_for_student(student.id).unwrap().is_none());
        assert!(db.allocations().active_students_in_room(room.id).unwrap().is_empty());

        let history = db.allocations().list_for_student(student.id).unwrap();
        assert_eq!(history[0].check_out_date, Some(date(2024, 6, 1)));
        assert!(!history[0].is_active);
    }

    #[test]
    fn test_second_active_allocation_rejected_by_schema() {
        let (db, room, student) = setup();
        db.allocations()
            .create(&Allocation::new(room.id, student.id, date(2024, 1, 1)))
            .unwrap();
        assert!(db
            .allocations()
            .create(&Allocation::new(room.id, student.id, date(2024, 2, 1)))
            .is_err());
    }
}
