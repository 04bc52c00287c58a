use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geogrant_core::{AppError, UserId};
use serde::{Deserialize, Serialize};

use crate::grant::{GrantId, RegionId};

const PERMANENT_TAG: &str = "permanent";
const TEMPORARY_PREFIX: &str = "temporary:";

/// Reason an effective-access row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessJustification {
    /// Backed by a permanent region assignment.
    Permanent,
    /// Backed by one temporary grant.
    Temporary(GrantId),
}

impl AccessJustification {
    /// Picks the justification for a `(user, region)` pair.
    ///
    /// A permanent assignment always wins; otherwise the given active grant
    /// justifies the row; with neither, the row must not exist.
    #[must_use]
    pub fn resolve(has_permanent_assignment: bool, active_grant: Option<GrantId>) -> Option<Self> {
        if has_permanent_assignment {
            return Some(Self::Permanent);
        }

        active_grant.map(Self::Temporary)
    }

    /// Returns the storage tag shared by every projection writer.
    #[must_use]
    pub fn as_storage_value(&self) -> String {
        match self {
            Self::Permanent => PERMANENT_TAG.to_owned(),
            Self::Temporary(grant_id) => format!("{TEMPORARY_PREFIX}{grant_id}"),
        }
    }

    /// Returns the backing grant, for temporary rows.
    #[must_use]
    pub fn grant_id(&self) -> Option<GrantId> {
        match self {
            Self::Permanent => None,
            Self::Temporary(grant_id) => Some(*grant_id),
        }
    }
}

impl FromStr for AccessJustification {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == PERMANENT_TAG {
            return Ok(Self::Permanent);
        }

        value
            .strip_prefix(TEMPORARY_PREFIX)
            .ok_or_else(|| {
                AppError::Validation(format!("unknown access justification '{value}'"))
            })
            .and_then(GrantId::parse)
            .map(Self::Temporary)
    }
}

impl Display for AccessJustification {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_storage_value().as_str())
    }
}

/// One row of the effective-access projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAccess {
    /// User holding access.
    pub user_id: UserId,
    /// Region the user may access.
    pub region: RegionId,
    /// What keeps the row alive.
    pub justification: AccessJustification,
}

/// Permanent region assignment owned by the assignment path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanentAssignment {
    /// Assigned user.
    pub user_id: UserId,
    /// Assigned region.
    pub region: RegionId,
    /// Actor who made the assignment.
    pub assigned_by_user_id: UserId,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::AccessJustification;
    use crate::GrantId;

    #[test]
    fn justification_roundtrips_storage_tag() {
        let grant_id = GrantId::new();
        let tag = AccessJustification::Temporary(grant_id).as_storage_value();

        assert!(tag.starts_with("temporary:"));
        assert!(matches!(
            AccessJustification::from_str(tag.as_str()),
            Ok(AccessJustification::Temporary(parsed)) if parsed == grant_id
        ));
        assert!(matches!(
            AccessJustification::from_str("permanent"),
            Ok(AccessJustification::Permanent)
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(AccessJustification::from_str("temporary:nope").is_err());
        assert!(AccessJustification::from_str("inherited").is_err());
    }

    #[test]
    fn permanent_assignment_wins_resolution() {
        let grant_id = GrantId::new();

        assert_eq!(
            AccessJustification::resolve(true, Some(grant_id)),
            Some(AccessJustification::Permanent)
        );
        assert_eq!(
            AccessJustification::resolve(false, Some(grant_id)),
            Some(AccessJustification::Temporary(grant_id))
        );
        assert_eq!(AccessJustification::resolve(false, None), None);
    }
}
