use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geogrant_core::{AppResult, UserId};
use geogrant_domain::{AuditAction, GrantId, RegionId};
use tracing::warn;

/// Immutable audit event payload emitted by grant use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Grant the event refers to, when any.
    pub grant_id: Option<GrantId>,
    /// User whose access changed.
    pub subject_user_id: UserId,
    /// Region whose access changed.
    pub region: RegionId,
    /// Actor that caused the event; `None` for reconciler-driven expiry.
    pub actor_user_id: Option<UserId>,
    /// Server timestamp of the event.
    pub occurred_at: DateTime<Utc>,
    /// Caller-provided justification, when any.
    pub reason: Option<String>,
    /// Optional structured detail.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Delivers an audit event once, logging and dropping delivery failures.
///
/// Audit is observational: a failed append never undoes the grant mutation
/// that produced it.
pub(crate) async fn append_best_effort(repository: &dyn AuditRepository, event: AuditEvent) {
    let action = event.action;
    let grant_id = event.grant_id;

    if let Err(error) = repository.append_event(event).await {
        warn!(
            action = action.as_str(),
            grant_id = ?grant_id,
            error = %error,
            "failed to deliver audit event"
        );
    }
}
