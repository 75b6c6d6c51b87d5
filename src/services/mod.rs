//! Service layer for business logic operations.
//!
//! Services encapsulate business logic and coordinate between
//! repositories and handlers.

mod category_service;

pub use category_service::CategoryService;

use crate::config::HierarchyConfig;
use crate::repositories::Repositories;

/// Aggregates all services for convenient access.
///
/// This struct is designed to be used as Axum application state.
/// Cloning is cheap since underlying pools use `Arc` internally.
#[derive(Clone)]
pub struct Services {
    pub categories: CategoryService,
}

impl Services {
    /// Creates a new Services instance from Repositories.
    pub fn new(repos: Repositories, hierarchy: &HierarchyConfig) -> Self {
        Self {
            categories: CategoryService::new(repos.categories, hierarchy),
        }
    }
}
