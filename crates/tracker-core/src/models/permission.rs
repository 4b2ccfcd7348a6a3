//! Affiliation permission levels and the role hierarchy.
//!
//! Roles form the strict order `user < admin < owner < super_admin`.
//! `pending` marks a join request awaiting approval; it grants nothing
//! and is incomparable with every other level.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Pending,
    User,
    Admin,
    Owner,
    SuperAdmin,
}

impl Permission {
    /// Every assignable level, lowest first.
    pub fn hierarchy() -> &'static [Permission] {
        &[
            Permission::User,
            Permission::Admin,
            Permission::Owner,
            Permission::SuperAdmin,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Pending => "pending",
            Permission::User => "user",
            Permission::Admin => "admin",
            Permission::Owner => "owner",
            Permission::SuperAdmin => "super_admin",
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            Permission::Pending => None,
            Permission::User => Some(0),
            Permission::Admin => Some(1),
            Permission::Owner => Some(2),
            Permission::SuperAdmin => Some(3),
        }
    }

    /// Admin, owner or super admin.
    pub fn is_admin(&self) -> bool {
        *self >= Permission::Admin
    }

    /// Owner or super admin.
    pub fn is_owner(&self) -> bool {
        *self >= Permission::Owner
    }

    /// True for any non-pending level.
    pub fn is_member(&self) -> bool {
        self.rank().is_some()
    }

    /// Whether a caller holding `self` may assign, remove or act upon an
    /// affiliation at level `target`.
    ///
    /// The caller must be at least an admin; touching an owner or super
    /// admin affiliation additionally requires super admin.
    pub fn can_manage(&self, target: Permission) -> bool {
        if !self.is_admin() {
            return false;
        }
        match target {
            Permission::Owner | Permission::SuperAdmin => *self == Permission::SuperAdmin,
            _ => true,
        }
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Permission::Pending),
            "user" => Ok(Permission::User),
            "admin" => Ok(Permission::Admin),
            "owner" => Ok(Permission::Owner),
            "super_admin" => Ok(Permission::SuperAdmin),
            other => Err(TrackerError::Validation {
                message: format!("unknown permission: {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_is_strictly_ordered() {
        for window in Permission::hierarchy().windows(2) {
            assert!(window[0] < window[1], "{} < {}", window[0], window[1]);
        }
    }

    #[test]
    fn pending_is_incomparable() {
        assert_eq!(Permission::Pending.partial_cmp(&Permission::User), None);
        assert!(!(Permission::Pending >= Permission::User));
        assert!(!(Permission::Pending < Permission::User));
        assert!(!Permission::Pending.is_admin());
        assert!(!Permission::Pending.is_member());
    }

    #[test]
    fn lower_roles_cannot_manage_higher_roles() {
        for (i, actor) in Permission::hierarchy().iter().enumerate() {
            for target in &Permission::hierarchy()[i + 1..] {
                assert!(
                    !actor.can_manage(*target),
                    "{actor} should not manage {target}"
                );
            }
        }
    }

    #[test]
    fn owner_and_super_admin_targets_need_super_admin() {
        assert!(!Permission::Owner.can_manage(Permission::Owner));
        assert!(Permission::SuperAdmin.can_manage(Permission::Owner));
        assert!(Permission::SuperAdmin.can_manage(Permission::SuperAdmin));
    }

    #[test]
    fn users_manage_nothing() {
        for target in Permission::hierarchy() {
            assert!(!Permission::User.can_manage(*target));
            assert!(!Permission::Pending.can_manage(*target));
        }
    }

    #[test]
    fn admins_manage_users_and_admins() {
        assert!(Permission::Admin.can_manage(Permission::User));
        assert!(Permission::Admin.can_manage(Permission::Admin));
        assert!(Permission::Owner.can_manage(Permission::Admin));
    }

    #[test]
    fn parses_storage_strings() {
        for p in Permission::hierarchy() {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), *p);
        }
        assert_eq!("pending".parse::<Permission>().unwrap(), Permission::Pending);
        assert!("root".parse::<Permission>().is_err());
    }
}
