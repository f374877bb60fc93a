// WOTC Infrastructure - SQLite Adapter
// Implements: JobStore, TransactionalJobStore, RecordSource

mod connection;
mod error;
mod job_store;
mod migration;
mod record_source;
mod transaction;

pub use connection::create_pool;
pub use job_store::SqliteJobStore;
pub use migration::run_migrations;
pub use record_source::SqliteRecordSource;
pub use transaction::SqliteJobStoreTransaction;

pub use sqlx::SqlitePool;

// sqlx::Error cannot implement Into<AppError> here (orphan rules); see error::map_sqlx_error
