use std::sync::Arc;

use async_trait::async_trait;
use geogrant_core::{AppError, AppResult, UserId};
use geogrant_domain::Permission;

/// Repository port for permission lookups.
///
/// Backed by whichever role model owns grantor privileges; this subsystem
/// only asks which permissions a user currently holds.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Lists effective permissions for a user.
    async fn list_permissions_for_user(&self, user_id: UserId) -> AppResult<Vec<Permission>>;
}

/// Application service for authorization checks at the service boundary.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Ensures a user has the required permission.
    pub async fn require_permission(
        &self,
        user_id: UserId,
        permission: Permission,
    ) -> AppResult<()> {
        self.require_any_permission(user_id, &[permission]).await
    }

    /// Ensures a user has at least one of the listed permissions.
    pub async fn require_any_permission(
        &self,
        user_id: UserId,
        permissions: &[Permission],
    ) -> AppResult<()> {
        let granted = self.repository.list_permissions_for_user(user_id).await?;

        if permissions
            .iter()
            .any(|permission| granted.contains(permission))
        {
            return Ok(());
        }

        let required = permissions
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join("' or '");
        Err(AppError::Forbidden(format!(
            "user '{user_id}' is missing permission '{required}'"
        )))
    }
}
