//! List filters and pagination
//!
//! Every list operation takes optional equality filters, an optional
//! case-insensitive search term and a 1-based page number.

use serde::{Deserialize, Serialize};

use crate::models::{
    ComplaintCategory, ComplaintStatus, MaintenanceStatus, MaintenanceType, NotificationType,
    PaymentStatus, PaymentType, Priority, RoomStatus,
};

/// Rows per page for most lists
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Rows per page for the notification inbox
pub const NOTIFICATION_PAGE_SIZE: u32 = 20;

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually returned
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

/// Position of a page inside a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub offset: u64,
}

impl PageWindow {
    /// Clamp a requested page: missing or zero gives the first page, past the
    /// end gives the last. An empty set still has one (empty) page.
    pub fn resolve(requested: Option<u32>, total: u64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(u64::from(per_page)).max(1);
        let num_pages = u32::try_from(num_pages).unwrap_or(u32::MAX);
        let number = requested.unwrap_or(1).clamp(1, num_pages);
        Self {
            number,
            num_pages,
            per_page,
            offset: u64::from(number - 1) * u64::from(per_page),
        }
    }

    pub fn into_page<T>(self, items: Vec<T>, total: u64) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            per_page: self.per_page,
            total,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomFilter {
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceFilter {
    pub status: Option<MaintenanceStatus>,
    pub maintenance_type: Option<MaintenanceType>,
    /// Room number, description or reporter username
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub payment_type: Option<PaymentType>,
    /// Student username, first or last name, or transaction id
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub category: Option<ComplaintCategory>,
    /// Title, description, or reporter username/first/last name
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub unread_only: bool,
    /// Title or message
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentFilter {
    /// Username
    pub search: Option<String>,
    pub page: Option<u32>,
}
