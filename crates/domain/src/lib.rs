//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod grant;
mod security;

pub use access::{AccessJustification, EffectiveAccess, PermanentAssignment};
pub use grant::{
    AccessLevel, GrantId, GrantIssue, GrantRevocation, GrantStatus, RegionAccessGrant, RegionId,
    RemainingTime, StoredRegionAccessGrant,
};
pub use security::{AuditAction, Permission};
