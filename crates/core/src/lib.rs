//! Hostel Core Library
//!
//! Models, permissions, storage and the operations that tie them together
//! for running a student hostel: rooms and allocations, maintenance,
//! payments, complaints and notifications.

pub mod error;
pub mod invariants;
pub mod listing;
pub mod models;
pub mod permissions;
pub mod services;
pub mod storage;

pub use error::{Error, Result};
pub use listing::*;
pub use models::*;
pub use permissions::*;
pub use storage::{Database, MaintenanceCounts, RoomCounts};
