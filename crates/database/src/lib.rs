pub mod connection;
pub mod error;
pub mod repositories;
pub mod store;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use connection::{connect, Database, DatabaseConfig, MEMORY_URL};
pub use error::{DatabaseError, Result};
pub use repositories::{
    audit::AuditRepository,
    equipment::EquipmentRepository,
    groups::GroupRepository,
    logbook::LogbookRepository,
    roles::RoleRepository,
    users::UserRepository,
};
pub use store::{EntityStore, Filter, MemoryStore, PgStore, Query, Row, SharedStore, Table};
