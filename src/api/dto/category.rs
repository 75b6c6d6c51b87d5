//! Category request/response DTOs.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{BatchCategoryRecord, Category, CategoryWithParent, NewCategory, UpdateCategory};

/// Request body for creating a single category.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    #[schema(example = "Books")]
    pub name: String,
    /// Defaults to `false`
    pub active: Option<bool>,
    #[validate(range(min = 1, message = "Parent id must be positive"))]
    pub parent_id: Option<i32>,
}

impl CreateCategoryRequest {
    pub fn into_new_category(self) -> NewCategory {
        NewCategory {
            name: self.name,
            active: self.active.unwrap_or(false),
            parent_id: self.parent_id,
        }
    }
}

/// Request body for a partial update.
///
/// An explicit `"parent_id": null` moves the category to the root level,
/// leaving the key out keeps the current parent.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>, nullable)]
    pub parent_id: Option<Option<i32>>,
}

impl UpdateCategoryRequest {
    pub fn into_update_category(self) -> UpdateCategory {
        UpdateCategory {
            name: self.name,
            active: self.active,
            parent_id: self.parent_id,
        }
    }
}

/// Maps a present key (even `null`) to `Some`, so absence stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One record of a bulk creation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchCategoryRequest {
    #[schema(example = "Fiction", min_length = 1, max_length = 255)]
    pub name: String,
    pub active: Option<bool>,
    /// Existing category to attach to
    pub parent_id: Option<i32>,
    /// 1-based index of an earlier record of the same batch
    #[schema(example = 1)]
    pub parent_position: Option<i64>,
}

impl From<BatchCategoryRequest> for BatchCategoryRecord {
    fn from(req: BatchCategoryRequest) -> Self {
        BatchCategoryRecord {
            name: req.name,
            active: req.active,
            parent_id: req.parent_id,
            parent_position: req.parent_position,
        }
    }
}

/// Request body for `POST /api/categories/bulk`.
///
/// Record-level rules are checked by the hierarchy planner so failures can
/// name the offending record index.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "categories": [
        { "name": "Books" },
        { "name": "Fiction", "parent_position": 1 },
        { "name": "Poetry", "parent_id": 12 }
    ]
}))]
pub struct BulkCreateRequest {
    pub categories: Vec<BatchCategoryRequest>,
}

impl BulkCreateRequest {
    pub fn into_records(self) -> Vec<BatchCategoryRecord> {
        self.categories.into_iter().map(Into::into).collect()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkCreateResponse {
    /// Created categories, in request order
    pub categories: Vec<CategoryResponse>,
}

/// Query string of `GET /api/categories/descendants`.
///
/// `parent_ids` is a comma separated list; `null` names the root level.
/// A missing parameter means "roots", an empty one means "nothing".
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct DescendantsQuery {
    #[param(example = "1,2,null")]
    pub parent_ids: Option<String>,
}

impl DescendantsQuery {
    pub fn parent_ids(&self) -> AppResult<Option<Vec<Option<i32>>>> {
        let Some(raw) = self.parent_ids.as_deref() else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                if item.eq_ignore_ascii_case("null") {
                    return Ok(None);
                }
                item.parse::<i32>().map(Some).map_err(|_| AppError::Validation {
                    field: "parent_ids".to_string(),
                    reason: format!("'{}' is neither a category id nor null", item),
                })
            })
            .collect::<AppResult<Vec<_>>>()
            .map(Some)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DescendantIdsResponse {
    /// Distinct descendant ids, ascending
    #[schema(example = json!([3, 4, 5]))]
    pub ids: Vec<i32>,
}

/// Category response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Books")]
    pub name: String,
    pub active: bool,
    pub parent_id: Option<i32>,
    #[schema(example = "2025-06-01T12:00:00.000Z")]
    pub created_at: String,
    #[schema(example = "2025-06-01T12:00:00.000Z")]
    pub updated_at: String,
}

fn format_timestamp(value: jiff_diesel::DateTime) -> String {
    jiff::civil::DateTime::from(value)
        .strftime("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            active: category.active,
            parent_id: category.parent_id,
            created_at: format_timestamp(category.created_at),
            updated_at: format_timestamp(category.updated_at),
        }
    }
}

/// Category response with its resolved parent.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetailResponse {
    #[serde(flatten)]
    pub category: CategoryResponse,
    pub parent: Option<CategoryResponse>,
}

impl From<CategoryWithParent> for CategoryDetailResponse {
    fn from(value: CategoryWithParent) -> Self {
        Self {
            category: value.category.into(),
            parent: value.parent.map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: Option<&str>) -> DescendantsQuery {
        DescendantsQuery {
            parent_ids: raw.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_parent_ids_means_roots() {
        assert_eq!(query(None).parent_ids().unwrap(), None);
    }

    #[test]
    fn test_empty_parent_ids_means_empty_list() {
        assert_eq!(query(Some("")).parent_ids().unwrap(), Some(vec![]));
    }

    #[test]
    fn test_parent_ids_mix_ids_and_null() {
        assert_eq!(
            query(Some("1, 2,NULL,null")).parent_ids().unwrap(),
            Some(vec![Some(1), Some(2), None, None])
        );
    }

    #[test]
    fn test_parent_ids_rejects_garbage() {
        let err = query(Some("1,abc")).parent_ids().unwrap_err();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "parent_ids"));
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let absent: UpdateCategoryRequest = serde_json::from_str(r#"{"name":"A"}"#).unwrap();
        assert_eq!(absent.parent_id, None);

        let to_root: UpdateCategoryRequest = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(to_root.parent_id, Some(None));

        let moved: UpdateCategoryRequest = serde_json::from_str(r#"{"parent_id":7}"#).unwrap();
        assert_eq!(moved.into_update_category().parent_id, Some(Some(7)));
    }

    #[test]
    fn test_create_request_defaults_inactive() {
        let req: CreateCategoryRequest = serde_json::from_str(r#"{"name":"Books"}"#).unwrap();
        let new_category = req.into_new_category();
        assert!(!new_category.active);
        assert_eq!(new_category.parent_id, None);
    }

    #[test]
    fn test_bulk_request_keeps_order_and_references() {
        let req: BulkCreateRequest = serde_json::from_str(
            r#"{"categories":[{"name":"A"},{"name":"B","parent_position":1},{"name":"C","parent_id":9}]}"#,
        )
        .unwrap();
        let records = req.into_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].parent_position, Some(1));
        assert_eq!(records[2].parent_id, Some(9));
    }

    #[test]
    fn test_category_response_formats_timestamps() {
        let at = || jiff_diesel::DateTime::from(jiff::civil::date(2025, 6, 1).at(12, 30, 0, 0));
        let response = CategoryResponse::from(Category {
            id: 1,
            name: "Books".to_string(),
            active: true,
            parent_id: None,
            created_at: at(),
            updated_at: at(),
            deleted_at: None,
        });
        assert_eq!(response.created_at, "2025-06-01T12:30:00.000Z");
    }
}
