use utoipa::OpenApi;

pub const CATEGORY_TAG: &str = "Categories";
pub const HEALTH_TAG: &str = "Health";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog",
        description = "Category tree service backed by a closure table",
    ),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::error::ValidationFieldError,
        )
    ),
    tags(
        (name = CATEGORY_TAG, description = "Category tree endpoints"),
        (name = HEALTH_TAG, description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;
