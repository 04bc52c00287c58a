use async_trait::async_trait;
use tokio::sync::Mutex;

use geogrant_application::{AuditEvent, AuditRepository};
use geogrant_core::AppResult;

/// In-memory append-only audit sink.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event appended so far, oldest first.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
