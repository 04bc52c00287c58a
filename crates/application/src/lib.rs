//! Application services and ports.

#![forbid(unsafe_code)]

mod access_ports;
mod audit_ports;
mod authorization_service;
mod clock;
mod effective_access_service;
mod expiration_reconciler;
mod grant_ports;
mod permanent_assignment_service;
mod region_grant_service;
mod sweep_lease_ports;

pub use access_ports::{EffectiveAccessRepository, PermanentAssignmentRepository};
pub use audit_ports::{AuditEvent, AuditRepository};
pub use authorization_service::{AuthorizationRepository, AuthorizationService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use effective_access_service::EffectiveAccessService;
pub use expiration_reconciler::{ExpirationReconciler, SweepOutcome, SweepReport};
pub use grant_ports::{
    CreateRegionGrantInput, GrantPage, GrantRepository, RegionGrantQuery, RegionGrantView,
};
pub use permanent_assignment_service::PermanentAssignmentService;
pub use region_grant_service::RegionGrantService;
pub use sweep_lease_ports::{
    EXPIRATION_SWEEP_SCOPE, SweepLease, SweepLeaseCoordinator, validate_sweep_lease_request,
};
