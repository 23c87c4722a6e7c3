//! Payment bookkeeping

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::listing::{Page, PaymentFilter};
use crate::models::{Money, Payment, PaymentStatus, PaymentType, Role, User};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub student_id: Uuid,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub remarks: String,
}

/// Raise a charge against a student, linked to their current allocation
#[instrument(skip(db, actor, new), fields(student_id = %new.student_id, amount = %new.amount))]
pub fn create(db: &Database, actor: &User, new: &NewPayment) -> Result<Payment> {
    PermissionMatrix::require(actor, Capability::ManagePayments)?;
    if new.amount.cents() <= 0 {
        return Err(Error::Validation("Amount must be positive".into()));
    }
    let student = db
        .users()
        .find_by_id(new.student_id)?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| Error::Validation(format!("Unknown student {}", new.student_id)))?;

    let allocation_id = db
        .allocations()
        .find_active_for_student(student.id)?
        .map(|a| a.id);
    let mut payment = Payment::new(
        student.id,
        allocation_id,
        new.payment_type,
        new.amount,
        new.due_date,
    );
    payment.remarks = new.remarks.trim().to_string();
    db.payments().create(&payment)?;

    info!(payment_id = %payment.id, "Payment created");
    Ok(payment)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Record the outcome of a payment. Completion stamps the payment date.
#[instrument(skip(db, actor, receipt), fields(status = %receipt.status.as_str()))]
pub fn record(db: &Database, actor: &User, payment_id: Uuid, receipt: &PaymentReceipt) -> Result<Payment> {
    PermissionMatrix::require(actor, Capability::ManagePayments)?;
    let mut payment = db
        .payments()
        .find_by_id(payment_id)?
        .ok_or_else(|| Error::NotFound(format!("Payment {}", payment_id)))?;

    if receipt.status == PaymentStatus::Completed && receipt.transaction_id.trim().is_empty() {
        return Err(Error::Validation(
            "A completed payment needs a transaction id".into(),
        ));
    }

    payment.status = receipt.status;
    payment.transaction_id = receipt.transaction_id.trim().to_string();
    payment.payment_method = receipt.payment_method.trim().to_string();
    if let Some(remarks) = &receipt.remarks {
        payment.remarks = remarks.trim().to_string();
    }
    if payment.status == PaymentStatus::Completed {
        payment.payment_date.get_or_insert_with(Utc::now);
    }
    payment.updated_at = Utc::now();
    db.payments().update(&payment)?;

    info!(payment_id = %payment.id, "Payment recorded");
    Ok(payment)
}

pub fn list(db: &Database, actor: &User, filter: &PaymentFilter) -> Result<Page<Payment>> {
    PermissionMatrix::require(actor, Capability::ViewPayments)?;
    db.payments().list(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoomType;
    use crate::services::fixtures::{self, date};
    use crate::services::rooms::allocate;

    fn rent(student_id: Uuid, cents: i64) -> NewPayment {
        NewPayment {
            student_id,
            payment_type: PaymentType::Rent,
            amount: Money::from_cents(cents),
            due_date: date(2024, 2, 1),
            remarks: String::new(),
        }
    }

    #[test]
    fn test_create_links_active_allocation() {
        let mut db = fixtures::db();
        let admin = fixtures::user(&db, "admin", Role::Admin);
        let amy = fixtures::user(&db, "amy", Role::Student);
        let room = fixtures::room(&db, "101", RoomType::Single);
        let allocation = allocate(&mut db, &admin, room.id, amy.id, date(2024, 1, 1)).unwrap();

        let payment = create(&db, &admin, &rent(amy.id, 45_000)).unwrap();
        assert_eq!(payment.allocation_id, Some(allocation.id));
        assert_eq!(payment.status, PaymentStatus::Pending);

        assert!(matches!(create(&db, &admin, &rent(amy.id, 0)), Err(Error::Validation(_))));
        assert!(matches!(
            create(&db, &admin, &rent(admin.id, 100)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_payments_are_admin_only() {
        let db = fixtures::db();
        let staff = fixtures::user(&db, "warden", Role::Staff);
        let amy = fixtures::user(&db, "amy", Role::Student);

        assert!(matches!(
            create(&db, &staff, &rent(amy.id, 100)),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            list(&db, &staff, &PaymentFilter::default()),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_record_completion() {
        let db = fixtures::db();
        let admin = fixtures::user(&db, "admin", Role::Admin);
        let amy = fixtures::user(&db, "amy", Role::Student);
        let payment = create(&db, &admin, &rent(amy.id, 100)).unwrap();

        let missing_tx = PaymentReceipt {
            status: PaymentStatus::Completed,
            transaction_id: " ".into(),
            payment_method: "cash".into(),
            remarks: None,
        };
        assert!(matches!(
            record(&db, &admin, payment.id, &missing_tx),
            Err(Error::Validation(_))
        ));

        let paid = record(
            &db,
            &admin,
            payment.id,
            &PaymentReceipt {
                transaction_id: "TX-1".into(),
                ..missing_tx
            },
        )
        .unwrap();
        assert!(paid.payment_date.is_some());

        let page = list(
            &db,
            &admin,
            &PaymentFilter {
                status: Some(PaymentStatus::Completed),
                search: Some("tx-1".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].payment_method, "cash");
    }
}
