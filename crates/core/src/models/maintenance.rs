//! Maintenance request model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

choice_enum! {
    pub enum MaintenanceType {
        Repair => ("repair", "Repair"),
        Cleaning => ("cleaning", "Cleaning"),
        Inspection => ("inspection", "Inspection"),
        Renovation => ("renovation", "Renovation"),
    }
}

choice_enum! {
    pub enum MaintenanceStatus {
        Pending => ("pending", "Pending"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

impl MaintenanceStatus {
    /// Open work keeps the room under maintenance
    pub fn is_open(&self) -> bool {
        matches!(self, MaintenanceStatus::Pending | MaintenanceStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub room_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub description: String,
    pub reported_by: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: MaintenanceStatus,
    pub scheduled_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceRecord {
    pub fn new(
        room_id: Uuid,
        maintenance_type: MaintenanceType,
        description: String,
        reported_by: Option<Uuid>,
        scheduled_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            room_id,
            maintenance_type,
            description,
            reported_by,
            assigned_to: None,
            status: MaintenanceStatus::Pending,
            scheduled_date,
            completion_date: None,
            remarks: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
