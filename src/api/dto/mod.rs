//! Data Transfer Objects for API requests and responses.

mod category;
mod error;
mod health;
mod pagination;

pub use category::{
    BatchCategoryRequest, BulkCreateRequest, BulkCreateResponse, CategoryDetailResponse,
    CategoryResponse, CreateCategoryRequest, DescendantIdsResponse, DescendantsQuery,
    UpdateCategoryRequest,
};
pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use pagination::{PagedResponse, PaginationMeta, PaginationParams};
