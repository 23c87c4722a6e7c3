//! Payment storage operations

use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::filter::SqlFilter;
use super::parse::{
    fmt_date, fmt_datetime, parse_choice, parse_date, parse_datetime, parse_datetime_opt,
    parse_uuid, parse_uuid_opt, OptionalExt,
};
use crate::error::Result;
use crate::listing::{Page, PageWindow, PaymentFilter, DEFAULT_PAGE_SIZE};
use crate::models::{Money, Payment, PaymentStatus, PaymentType};

const PAYMENT_COLUMNS: &str = "p.id, p.student_id, p.allocation_id, p.payment_type, p.amount, \
     p.status, p.due_date, p.payment_date, p.transaction_id, p.payment_method, p.remarks, \
     p.created_at, p.updated_at";

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        student_id: parse_uuid(&row.get::<_, String>(1)?)?,
        allocation_id: parse_uuid_opt(row.get::<_, Option<String>>(2)?)?,
        payment_type: parse_choice(&row.get::<_, String>(3)?, PaymentType::from_str)?,
        amount: Money::from_cents(row.get(4)?),
        status: parse_choice(&row.get::<_, String>(5)?, PaymentStatus::from_str)?,
        due_date: parse_date(&row.get::<_, String>(6)?)?,
        payment_date: parse_datetime_opt(row.get::<_, Option<String>>(7)?)?,
        transaction_id: row.get(8)?,
        payment_method: row.get(9)?,
        remarks: row.get(10)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(12)?)?,
    })
}

pub struct PaymentStore<'a> {
    conn: &'a Connection,
}

impl<'a> PaymentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, payment), fields(student_id = %payment.student_id, amount = %payment.amount))]
    pub fn create(&self, payment: &Payment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO payments (id, student_id, allocation_id, payment_type, amount, status,
                 due_date, payment_date, transaction_id, payment_method, remarks, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                payment.id.to_string(),
                payment.student_id.to_string(),
                payment.allocation_id.map(|id| id.to_string()),
                payment.payment_type.as_str(),
                payment.amount.cents(),
                payment.status.as_str(),
                fmt_date(&payment.due_date),
                payment.payment_date.as_ref().map(fmt_datetime),
                payment.transaction_id,
                payment.payment_method,
                payment.remarks,
                fmt_datetime(&payment.created_at),
                fmt_datetime(&payment.updated_at),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let payment = self
            .conn
            .query_row(
                &format!("SELECT {} FROM payments p WHERE p.id = ?1", PAYMENT_COLUMNS),
                params![id.to_string()],
                payment_from_row,
            )
            .optional()?;
        Ok(payment)
    }

    /// Persist status and settlement details
    #[instrument(skip(self, payment), fields(id = %payment.id, status = %payment.status.as_str()))]
    pub fn update(&self, payment: &Payment) -> Result<()> {
        self.conn.execute(
            "UPDATE payments
             SET status = ?1, payment_date = ?2, transaction_id = ?3, payment_method = ?4,
                 remarks = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                payment.status.as_str(),
                payment.payment_date.as_ref().map(fmt_datetime),
                payment.transaction_id,
                payment.payment_method,
                payment.remarks,
                fmt_datetime(&payment.updated_at),
                payment.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Filtered, searched and paginated list ordered by due date, latest first
    #[instrument(skip(self))]
    pub fn list(&self, filter: &PaymentFilter) -> Result<Page<Payment>> {
        let sql_filter = SqlFilter::new()
            .eq("p.status", filter.status.map(|s| s.as_str()))
            .eq("p.payment_type", filter.payment_type.map(|t| t.as_str()))
            .search(
                &["u.username", "u.first_name", "u.last_name", "p.transaction_id"],
                filter.search.as_deref(),
            );
        let from = "payments p INNER JOIN users u ON u.id = p.student_id";

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", from, sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;
        let window = PageWindow::resolve(filter.page, total as u64, DEFAULT_PAGE_SIZE);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {}{} ORDER BY p.due_date DESC, p.rowid DESC LIMIT ? OFFSET ?",
            PAYMENT_COLUMNS,
            from,
            sql_filter.where_sql()
        ))?;
        let payments = stmt
            .query_map(
                params_from_iter(sql_filter.params_with_page(window.per_page, window.offset)),
                payment_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(window.into_page(payments, total as u64))
    }

    /// Most recently created payments
    pub fn list_recent(&self, limit: u32) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payments p ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?1",
            PAYMENT_COLUMNS
        ))?;
        let payments = stmt
            .query_map(params![limit], payment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    /// A student's latest payments by due date
    pub fn list_for_student(&self, student_id: Uuid, limit: u32) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payments p WHERE p.student_id = ?1
             ORDER BY p.due_date DESC, p.rowid DESC LIMIT ?2",
            PAYMENT_COLUMNS
        ))?;
        let payments = stmt
            .query_map(params![student_id.to_string(), limit], payment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    /// Sum of completed payments
    pub fn total_collected(&self) -> Result<Money> {
        let cents: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'completed'",
            [],
            |row| row.get(0),
        )?;
        Ok(Money::from_cents(cents))
    }

    pub fn count_by_status(&self, status: PaymentStatus) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM payments WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use crate::storage::Database;
    use chrono::NaiveDate;

    fn student(db: &Database, username: &str, first: &str, last: &str) -> User {
        let mut user = User::new(username.into(), "hash".into(), Role::Student);
        user.first_name = first.into();
        user.last_name = last.into();
        db.users().create(&user).unwrap();
        user
    }

    fn due(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, 1).unwrap()
    }

    #[test]
    fn test_create_update_and_find() {
        let db = Database::open_in_memory().unwrap();
        let s = student(&db, "amy", "Amy", "Pond");
        let mut p = Payment::new(s.id, None, PaymentType::Rent, Money::from_cents(50_000), due(1));
        db.payments().create(&p).unwrap();

        p.status = PaymentStatus::Completed;
        p.transaction_id = "TX-9".into();
        p.payment_method = "card".into();
        p.payment_date = Some(chrono::Utc::now());
        db.payments().update(&p).unwrap();

        let found = db.payments().find_by_id(p.id).unwrap().unwrap();
        assert_eq!(found.status, PaymentStatus::Completed);
        assert_eq!(found.transaction_id, "TX-9");
        assert!(found.payment_date.is_some());
        assert_eq!(db.payments().total_collected().unwrap(), Money::from_cents(50_000));
    }

    #[test]
    fn test_list_search_and_filters() {
        let db = Database::open_in_memory().unwrap();
        let amy = student(&db, "amy", "Amy", "Pond");
        let rory = student(&db, "rory", "Rory", "Williams");

        let mut a = Payment::new(amy.id, None, PaymentType::Rent, Money::from_cents(100), due(1));
        a.transaction_id = "ABC123".into();
        db.payments().create(&a).unwrap();
        db.payments()
            .create(&Payment::new(amy.id, None, PaymentType::Deposit, Money::from_cents(200), due(3)))
            .unwrap();
        db.payments()
            .create(&Payment::new(rory.id, None, PaymentType::Rent, Money::from_cents(300), due(2)))
            .unwrap();

        let all = db.payments().list(&PaymentFilter::default()).unwrap();
        let months: Vec<_> = all.items.iter().map(|p| p.due_date).collect();
        assert_eq!(months, vec![due(3), due(2), due(1)]);

        let by_last_name = db
            .payments()
            .list(&PaymentFilter {
                search: Some("willi".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_last_name.total, 1);
        assert_eq!(by_last_name.items[0].student_id, rory.id);

        let by_tx = db
            .payments()
            .list(&PaymentFilter {
                search: Some("abc".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_tx.items[0].id, a.id);

        let rent = db
            .payments()
            .list(&PaymentFilter {
                payment_type: Some(PaymentType::Rent),
                status: Some(PaymentStatus::Pending),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rent.total, 2);

        assert_eq!(db.payments().list_for_student(amy.id, 5).unwrap().len(), 2);
        assert_eq!(db.payments().list_recent(2).unwrap().len(), 2);
        assert_eq!(db.payments().count_by_status(PaymentStatus::Pending).unwrap(), 3);
    }
}
