//! Hostel operations
//!
//! Each operation checks the actor's capability first, then validates and
//! writes. Operations touching more than one row run inside a single
//! immediate transaction so a failure leaves nothing behind.

pub mod accounts;
pub mod complaints;
pub mod maintenance;
pub mod notifications;
pub mod payments;
pub mod reports;
pub mod rooms;

use crate::error::{Error, Result};

/// Trimmed, non-empty text or a validation error naming the field
pub(crate) fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::Validation(format!("{} is required", field)))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;

    use crate::models::{Money, Role, Room, RoomType, User};
    use crate::storage::Database;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, username: &str, role: Role) -> User {
        let user = User::new(username.to_string(), "hash".to_string(), role);
        db.users().create(&user).unwrap();
        user
    }

    pub fn room(db: &Database, number: &str, room_type: RoomType) -> Room {
        let room = Room::new(number.to_string(), 1, room_type, Money::from_cents(30_000));
        db.rooms().create(&room).unwrap();
        room
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Leak ", "title").unwrap(), "Leak");
        let err = required("   ", "title").unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: title is required");
    }
}
