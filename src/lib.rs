pub mod aggregate;
pub mod db;
pub mod fixtures;
pub mod loader;
pub mod models;
pub mod report;
pub mod risk;

pub use aggregate::{aggregate, Aggregate};
pub use models::{AuditSnapshot, ClassifiedUser, LoginLogEntry, UserRecord};
pub use risk::classify;
