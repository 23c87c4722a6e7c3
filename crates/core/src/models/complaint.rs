//! Complaint model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

choice_enum! {
    pub enum ComplaintStatus {
        Open => ("open", "Open"),
        InProgress => ("in_progress", "In Progress"),
        Resolved => ("resolved", "Resolved"),
        Closed => ("closed", "Closed"),
    }
}

impl ComplaintStatus {
    /// Resolved and closed complaints carry a resolution timestamp
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }
}

choice_enum! {
    pub enum ComplaintCategory {
        Maintenance => ("maintenance", "Maintenance"),
        Cleanliness => ("cleanliness", "Cleanliness"),
        Security => ("security", "Security"),
        Noise => ("noise", "Noise"),
        Facility => ("facility", "Facility"),
        Other => ("other", "Other"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub status: ComplaintStatus,
    pub room_id: Option<Uuid>,
    pub reported_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    pub fn new(
        title: String,
        description: String,
        category: ComplaintCategory,
        room_id: Option<Uuid>,
        reported_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            category,
            status: ComplaintStatus::Open,
            room_id,
            reported_by,
            assigned_to: None,
            resolution: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
