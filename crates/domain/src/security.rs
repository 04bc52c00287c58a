use std::str::FromStr;

use geogrant_core::AppError;
use serde::{Deserialize, Serialize};

/// Permissions enforced by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows issuing, extending and revoking temporary region grants.
    RegionGrantManage,
    /// Allows reading grants of other users.
    RegionGrantRead,
    /// Allows managing permanent region assignments.
    RegionAssignmentManage,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegionGrantManage => "region.grant.manage",
            Self::RegionGrantRead => "region.grant.read",
            Self::RegionAssignmentManage => "region.assignment.manage",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::RegionGrantManage,
            Permission::RegionGrantRead,
            Permission::RegionAssignmentManage,
        ];

        ALL
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "region.grant.manage" => Ok(Self::RegionGrantManage),
            "region.grant.read" => Ok(Self::RegionGrantRead),
            "region.assignment.manage" => Ok(Self::RegionAssignmentManage),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Stable audit actions emitted by grant use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A temporary grant was issued.
    Grant,
    /// A grant expiry was moved.
    Extend,
    /// A grant was revoked early.
    Revoke,
    /// A grant was folded into expired state by the reconciler.
    Expire,
    /// A permanent region assignment was created.
    PermanentAssign,
    /// A permanent region assignment was removed.
    PermanentUnassign,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Extend => "extend",
            Self::Revoke => "revoke",
            Self::Expire => "expire",
            Self::PermanentAssign => "permanent_assign",
            Self::PermanentUnassign => "permanent_unassign",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Permission;

    #[test]
    fn permission_roundtrip_storage_value() {
        for permission in Permission::all() {
            let restored = Permission::from_str(permission.as_str());
            assert!(matches!(restored, Ok(value) if value == *permission));
        }
    }

    #[test]
    fn unknown_permission_is_rejected() {
        let parsed = Permission::from_str("region.grant.unknown");
        assert!(parsed.is_err());
    }
}
