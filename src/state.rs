//! Application state for Axum web framework.

use crate::config::HierarchyConfig;
use crate::db::AsyncDbPool;
use crate::repositories::Repositories;
use crate::services::Services;

/// Shared handles available to every request handler.
///
/// Cloning is cheap since both Services and AsyncDbPool use Arc internally.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub db_pool: AsyncDbPool,
}

impl AppState {
    /// Wires repositories and services on top of `pool`.
    pub fn new(pool: AsyncDbPool, hierarchy: &HierarchyConfig) -> Self {
        let repos = Repositories::new(pool.clone());
        let services = Services::new(repos, hierarchy);
        Self {
            services,
            db_pool: pool,
        }
    }
}
