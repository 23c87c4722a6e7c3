//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{derive_status, Allocation, Complaint, Room};

/// Validate that a room's counters and status agree
pub fn assert_room_invariants(room: &Room, has_open_maintenance: bool) {
    debug_assert!(
        room.current_occupancy <= room.capacity,
        "Room {} has occupancy {} above capacity {}",
        room.number,
        room.current_occupancy,
        room.capacity
    );

    debug_assert!(room.capacity > 0, "Room {} has zero capacity", room.number);

    let expected = derive_status(
        room.status,
        room.current_occupancy,
        room.capacity,
        has_open_maintenance,
    );
    debug_assert!(
        room.status == expected,
        "Room {} has status {:?}, expected {:?}",
        room.number,
        room.status,
        expected
    );
}

/// Validate that an allocation's dates and flags agree
pub fn assert_allocation_invariants(allocation: &Allocation) {
    debug_assert!(
        allocation.is_active == allocation.check_out_date.is_none(),
        "Allocation {} is_active={} but check_out_date={:?}",
        allocation.id,
        allocation.is_active,
        allocation.check_out_date
    );

    if let Some(out) = allocation.check_out_date {
        debug_assert!(
            out >= allocation.check_in_date,
            "Allocation {} checks out before it checks in",
            allocation.id
        );
    }
}

/// Validate resolution bookkeeping on a complaint
pub fn assert_complaint_invariants(complaint: &Complaint) {
    debug_assert!(
        !complaint.status.is_terminal() || complaint.resolved_at.is_some(),
        "Complaint {} is {:?} without resolved_at",
        complaint.id,
        complaint.status
    );
}

/// Validate that an ID is not nil
pub fn assert_id_valid(id: Uuid, context: &str) {
    debug_assert!(id != Uuid::nil(), "Nil id in context: {}", context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComplaintCategory, ComplaintStatus, Money, RoomStatus, RoomType};
    use chrono::NaiveDate;

    fn make_room() -> Room {
        Room::new("A1".into(), 1, RoomType::Double, Money::from_cents(10_000))
    }

    #[test]
    fn test_valid_room() {
        let mut room = make_room();
        assert_room_invariants(&room, false);

        room.current_occupancy = 2;
        room.status = RoomStatus::Occupied;
        assert_room_invariants(&room, false);
    }

    #[test]
    #[should_panic(expected = "above capacity")]
    fn test_overfull_room() {
        let mut room = make_room();
        room.current_occupancy = 3;
        room.status = RoomStatus::Occupied;
        assert_room_invariants(&room, false);
    }

    #[test]
    #[should_panic(expected = "expected Maintenance")]
    fn test_status_ignores_open_maintenance() {
        let room = make_room();
        assert_room_invariants(&room, true);
    }

    #[test]
    fn test_valid_allocation() {
        let mut allocation = Allocation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert_allocation_invariants(&allocation);

        allocation.check_out_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        allocation.is_active = false;
        assert_allocation_invariants(&allocation);
    }

    #[test]
    #[should_panic(expected = "without resolved_at")]
    fn test_resolved_complaint_needs_timestamp() {
        let mut complaint = Complaint::new(
            "Leak".into(),
            "Tap".into(),
            ComplaintCategory::Maintenance,
            None,
            Uuid::new_v4(),
        );
        complaint.status = ComplaintStatus::Resolved;
        assert_complaint_invariants(&complaint);
    }
}
