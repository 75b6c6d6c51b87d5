//! Database access plumbing.
//!
//! Async PostgreSQL connection pooling via diesel_async with bb8, plus the
//! embedded migrations applied by `catalog-rs migrate` and `auto_migrate`.

mod migrations;
mod pool;

pub use migrations::{MIGRATIONS, pending_migrations, revert_migrations, run_pending_migrations};
pub use pool::{AsyncDbPool, establish_async_connection_pool};
