//! Payment model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Money;

choice_enum! {
    pub enum PaymentType {
        Rent => ("rent", "Room Rent"),
        Deposit => ("deposit", "Security Deposit"),
        Maintenance => ("maintenance", "Maintenance Fee"),
        Utility => ("utility", "Utility Bill"),
        Other => ("other", "Other Charges"),
    }
}

choice_enum! {
    pub enum PaymentStatus {
        Pending => ("pending", "Pending"),
        Completed => ("completed", "Completed"),
        Failed => ("failed", "Failed"),
        Refunded => ("refunded", "Refunded"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub allocation_id: Option<Uuid>,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub status: PaymentStatus,
    pub due_date: NaiveDate,
    pub payment_date: Option<DateTime<Utc>>,
    pub transaction_id: String,
    pub payment_method: String,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        student_id: Uuid,
        allocation_id: Option<Uuid>,
        payment_type: PaymentType,
        amount: Money,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            student_id,
            allocation_id,
            payment_type,
            amount,
            status: PaymentStatus::Pending,
            due_date,
            payment_date: None,
            transaction_id: String::new(),
            payment_method: String::new(),
            remarks: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
