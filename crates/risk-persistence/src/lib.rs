//! Persistencia Diesel de eventos, auditoría, estado de workflow, registros
//! de gobernanza y almacén compartido.
//!
//! Un único `Database` (pool r2d2 + migraciones embebidas) alimenta a todos
//! los repositorios. SQLite es el backend por defecto; la feature `pg`
//! compila contra Postgres.

mod db;
mod errors;
mod events;
mod registry;
pub mod schema;
mod shared;
mod workflow;

#[cfg(any(test, not(feature = "pg")))]
pub use db::new_sqlite_for_test;
pub use db::{database_url_from_env, new_from_env, Database, MIGRATIONS};
pub use errors::PersistenceError;
pub use events::{DieselAuditRepository, DieselEventRepository};
pub use registry::DieselRegistry;
pub use shared::DieselSharedStore;
pub use workflow::DieselWorkflowStateStore;
