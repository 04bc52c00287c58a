pub mod access;
pub mod grants;
pub mod health;
pub mod reconcile;
