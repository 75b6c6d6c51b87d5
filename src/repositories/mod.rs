//! Repository layer for data access operations.
//!
//! [`CategoryStore`] / [`CategoryTx`] are the storage contract of the
//! hierarchy engine. PostgreSQL backs the running service, the in-memory
//! store backs tests and embedders.

mod category_repo;
mod memory_store;
mod store;

pub use category_repo::{PgCategoryStore, PgCategoryTx};
pub use memory_store::MemoryCategoryStore;
pub use store::{CategoryStore, CategoryTx};

use crate::db::AsyncDbPool;

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub categories: PgCategoryStore,
}

impl Repositories {
    /// Creates a new Repositories instance with all repositories initialized.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            categories: PgCategoryStore::new(pool),
        }
    }
}
