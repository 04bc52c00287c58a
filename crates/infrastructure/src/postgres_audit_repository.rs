use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use geogrant_application::{AuditEvent, AuditRepository};
use geogrant_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO grant_audit_events (
                id,
                action,
                grant_id,
                subject_user_id,
                region,
                actor_user_id,
                occurred_at,
                reason,
                detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.action.as_str())
        .bind(event.grant_id.map(|grant_id| grant_id.as_uuid()))
        .bind(event.subject_user_id.as_uuid())
        .bind(event.region.as_str())
        .bind(event.actor_user_id.map(|user_id| user_id.as_uuid()))
        .bind(event.occurred_at)
        .bind(event.reason)
        .bind(event.detail)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
