//! Permission system for hostel operations

use crate::error::{Error, Result};
use crate::models::{Role, User};

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    // Administration
    ViewDashboard,
    ManageUsers,
    ManageRooms,

    // Payments
    ViewPayments,
    ManagePayments,

    // Rooms and allocations
    ViewRooms,
    AllocateRooms,

    // Maintenance
    ViewMaintenance,
    ReportMaintenance,
    UpdateMaintenance,

    // Residents
    ViewStudents,

    // Complaints
    FileComplaints,
    ViewComplaints,
    ManageComplaints,
    ReceiveAssignments,

    // Notifications
    ReadNotifications,
    SendAnnouncements,
}

/// Permission matrix for roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: Role, capability: Capability) -> bool {
        use Capability::*;

        match (role, capability) {
            (Role::Admin, _) => true,

            (
                Role::Staff,
                AllocateRooms | UpdateMaintenance | ManageComplaints | ViewStudents
                | SendAnnouncements | ReceiveAssignments,
            ) => true,

            (Role::Staff | Role::Student, ReportMaintenance) => true,

            (
                _,
                ViewRooms | ViewMaintenance | FileComplaints | ViewComplaints | ReadNotifications,
            ) => true,

            _ => false,
        }
    }

    /// Fail with `PermissionDenied` unless the user's role allows the action
    pub fn require(user: &User, capability: Capability) -> Result<()> {
        if Self::can_perform(user.role, capability) {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "{} may not {:?}",
                user.role, capability
            )))
        }
    }

    /// Staff may update any complaint, the reporter only their own
    pub fn can_update_complaint(actor: &User, reporter_id: uuid::Uuid) -> bool {
        Self::can_perform(actor.role, Capability::ManageComplaints) || actor.id == reporter_id
    }
}
