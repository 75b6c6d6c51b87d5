//! Category request handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::CATEGORY_TAG;
use crate::api::dto::{
    BulkCreateRequest, BulkCreateResponse, CategoryDetailResponse, CategoryResponse,
    CreateCategoryRequest, DescendantIdsResponse, DescendantsQuery, ErrorResponse, PagedResponse,
    PaginationParams, UpdateCategoryRequest,
};
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

/// Creates category routes, mounted under `/api/categories`.
pub fn category_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_categories))
        .routes(routes!(create_category))
        .routes(routes!(bulk_create_categories))
        .routes(routes!(descendant_ids))
        .routes(routes!(get_category))
        .routes(routes!(get_children))
        .routes(routes!(update_category))
        .routes(routes!(delete_category))
}

/// GET /api/categories - List live categories by page
#[utoipa::path(
    get,
    path = "/",
    tag = CATEGORY_TAG,
    params(PaginationParams),
    responses(
        (status = 200, description = "Live categories", body = PagedResponse<CategoryResponse>),
        (status = 400, description = "Invalid pagination", body = ErrorResponse)
    )
)]
async fn list_categories(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<PagedResponse<CategoryResponse>>> {
    let (categories, total) = state
        .services
        .categories
        .list_categories(params.offset(), params.limit())
        .await?;
    let data = categories.into_iter().map(CategoryResponse::from).collect();
    let total = u64::try_from(total).unwrap_or_default();
    Ok(Json(PagedResponse::new(data, &params, total)))
}

/// POST /api/categories - Create a category
#[utoipa::path(
    post,
    path = "/",
    tag = CATEGORY_TAG,
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryDetailResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Parent not found", body = ErrorResponse)
    )
)]
async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryDetailResponse>)> {
    let created = state
        .services
        .categories
        .create_category(req.into_new_category())
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// POST /api/categories/bulk - Create a batch of categories atomically
///
/// Records may reference an existing category through `parent_id` or an
/// earlier record of the same batch through its 1-based `parent_position`.
#[utoipa::path(
    post,
    path = "/bulk",
    tag = CATEGORY_TAG,
    request_body = BulkCreateRequest,
    responses(
        (status = 201, description = "Batch created", body = BulkCreateResponse),
        (status = 400, description = "Invalid record, details name its index", body = ErrorResponse),
        (status = 404, description = "Referenced parent not found", body = ErrorResponse)
    )
)]
async fn bulk_create_categories(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<BulkCreateRequest>,
) -> AppResult<(StatusCode, Json<BulkCreateResponse>)> {
    let created = state
        .services
        .categories
        .bulk_create(req.into_records())
        .await?;
    let categories = created
        .into_iter()
        .map(|c| CategoryResponse::from(c.category))
        .collect();
    Ok((StatusCode::CREATED, Json(BulkCreateResponse { categories })))
}

/// GET /api/categories/descendants - Ids below the given parents
#[utoipa::path(
    get,
    path = "/descendants",
    tag = CATEGORY_TAG,
    params(DescendantsQuery),
    responses(
        (status = 200, description = "Descendant ids", body = DescendantIdsResponse),
        (status = 400, description = "Malformed parent list", body = ErrorResponse)
    )
)]
async fn descendant_ids(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<DescendantsQuery>,
) -> AppResult<Json<DescendantIdsResponse>> {
    let ids = state
        .services
        .categories
        .children_ids(query.parent_ids()?)
        .await?;
    Ok(Json(DescendantIdsResponse { ids }))
}

/// GET /api/categories/{id} - Fetch one live category
#[utoipa::path(
    get,
    path = "/{id}",
    tag = CATEGORY_TAG,
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category found", body = CategoryResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<CategoryResponse>> {
    let category = state.services.categories.get_category(id).await?;
    Ok(Json(category.into()))
}

/// GET /api/categories/{id}/children - Direct live children
#[utoipa::path(
    get,
    path = "/{id}/children",
    tag = CATEGORY_TAG,
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 200, description = "Children", body = Vec<CategoryResponse>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<CategoryResponse>>> {
    let children = state.services.categories.get_children(id).await?;
    Ok(Json(children.into_iter().map(CategoryResponse::from).collect()))
}

/// PUT /api/categories/{id} - Rename, toggle or move a category
#[utoipa::path(
    put,
    path = "/{id}",
    tag = CATEGORY_TAG,
    params(("id" = i32, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryDetailResponse),
        (status = 404, description = "Category or parent not found", body = ErrorResponse),
        (status = 409, description = "Move would create a cycle", body = ErrorResponse)
    )
)]
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(req): ValidatedJson<UpdateCategoryRequest>,
) -> AppResult<Json<CategoryDetailResponse>> {
    let updated = state
        .services
        .categories
        .update_category(id, req.into_update_category())
        .await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/categories/{id} - Soft-delete a category
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = CATEGORY_TAG,
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
async fn delete_category(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<StatusCode> {
    state.services.categories.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
