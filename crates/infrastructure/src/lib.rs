//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_grant_store;
mod postgres_audit_repository;
mod postgres_authorization_repository;
mod postgres_grant_store;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_grant_store::InMemoryGrantStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_grant_store::PostgresGrantStore;
