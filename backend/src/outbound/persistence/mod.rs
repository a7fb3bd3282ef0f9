//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Repositories are thin: they translate between row structs and domain
//! types and classify every failure into the error taxonomy at the point it
//! happens. Row structs (`models.rs`) and table definitions (`schema.rs`)
//! never leave this module.
//!
//! # Example
//!
//! ```ignore
//! use users_api::outbound::persistence::{DbPool, DieselUserRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/users")).await?;
//! let repo = DieselUserRepository::new(pool);
//! ```

mod diesel_error_mapping;
mod diesel_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
