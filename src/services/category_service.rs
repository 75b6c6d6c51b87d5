//! Category service: lifecycle operations around the hierarchy engine.

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::config::HierarchyConfig;
use crate::error::{AppError, AppResult};
use crate::hierarchy::{BulkHierarchyBuilder, DescendantQuery, HierarchyError};
use crate::models::{
    BatchCategoryRecord, Category, CategoryWithParent, MAX_NAME_LENGTH, NewCategory,
    UpdateCategory,
};
use crate::repositories::{CategoryStore, CategoryTx, PgCategoryStore};

/// Category service for handling category tree business logic.
///
/// Generic over the storage engine; the running server uses PostgreSQL.
/// Cloning is cheap as long as the store is.
#[derive(Clone)]
pub struct CategoryService<S = PgCategoryStore> {
    store: S,
    max_batch_size: usize,
}

/// Loads `parent_id` and insists on a live row.
async fn live_parent(tx: &mut dyn CategoryTx, parent_id: i32) -> AppResult<Category> {
    tx.find_by_id(parent_id)
        .await?
        .filter(Category::is_live)
        .ok_or_else(|| {
            HierarchyError::ParentNotFound {
                index: None,
                parent_id,
            }
            .into()
        })
}

/// Body of `update_category`, run inside the caller's transaction.
async fn apply_update(
    tx: &mut dyn CategoryTx,
    id: i32,
    changes: UpdateCategory,
) -> AppResult<CategoryWithParent> {
    let current = tx
        .find_by_id(id)
        .await?
        .filter(Category::is_live)
        .ok_or_else(|| AppError::category_not_found(id))?;

    let new_parent = changes.parent_id.filter(|p| *p != current.parent_id);
    if let Some(Some(parent_id)) = new_parent {
        live_parent(tx, parent_id).await?;
        let below = tx.descendant_ids(&DescendantQuery::of(id)).await?;
        if parent_id == id || below.contains(&parent_id) {
            return Err(HierarchyError::CycleDetected {
                category_id: id,
                parent_id,
            }
            .into());
        }
    }

    let category = if changes.is_empty() {
        current
    } else {
        tx.update(id, changes).await?
    };
    if let Some(parent_id) = new_parent {
        tx.move_subtree(id, parent_id).await?;
    }

    let parent = match category.parent_id {
        Some(parent_id) => tx.find_by_id(parent_id).await?,
        None => None,
    };
    Ok(CategoryWithParent { category, parent })
}

fn require_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            field: "name".to_string(),
            reason: "Name must not be blank".to_string(),
        });
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation {
            field: "name".to_string(),
            reason: format!("Name must be at most {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(trimmed.to_string())
}

impl<S: CategoryStore> CategoryService<S> {
    pub fn new(store: S, config: &HierarchyConfig) -> Self {
        Self {
            store,
            max_batch_size: config.max_batch_size,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a single category, maintaining its closure edges.
    pub async fn create_category(&self, new_category: NewCategory) -> AppResult<CategoryWithParent> {
        let name = require_name(&new_category.name)?;

        let created = self
            .store
            .transaction(move |tx| {
                async move {
                    let parent = match new_category.parent_id {
                        Some(parent_id) => Some(live_parent(tx, parent_id).await?),
                        None => None,
                    };
                    let category = tx
                        .insert(NewCategory {
                            name,
                            ..new_category
                        })
                        .await?;
                    Ok::<_, AppError>(CategoryWithParent { category, parent })
                }
                .boxed()
            })
            .await?;

        info!(
            category_id = created.category.id,
            parent_id = ?created.category.parent_id,
            "Category created"
        );
        Ok(created)
    }

    /// Creates a whole batch atomically.
    ///
    /// Results come back in input order. Validation failures are reported
    /// before the store is touched.
    pub async fn bulk_create(
        &self,
        records: Vec<BatchCategoryRecord>,
    ) -> AppResult<Vec<CategoryWithParent>> {
        if records.len() > self.max_batch_size {
            return Err(AppError::Validation {
                field: "categories".to_string(),
                reason: format!(
                    "Batch holds {} records, at most {} are accepted",
                    records.len(),
                    self.max_batch_size
                ),
            });
        }

        let builder = BulkHierarchyBuilder::plan(records).inspect_err(|e| {
            warn!(error = %e, "Rejected category batch");
        })?;
        if builder.is_empty() {
            return Ok(Vec::new());
        }

        info!(records = builder.len(), "Creating category batch");
        self.store
            .transaction(move |tx| builder.build(tx).boxed())
            .await
            .inspect_err(|e| warn!(error = %e, "Category batch aborted"))
    }

    /// Gets a live category by id.
    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.store
            .find_by_id(id)
            .await?
            .filter(Category::is_live)
            .ok_or_else(|| AppError::category_not_found(id))
    }

    /// Lists live categories with pagination.
    ///
    /// # Returns
    /// A tuple of (categories, total_count)
    pub async fn list_categories(&self, offset: i64, limit: i64) -> AppResult<(Vec<Category>, i64)> {
        self.store.list_live(offset, limit).await
    }

    /// Direct live children of a live category.
    pub async fn get_children(&self, id: i32) -> AppResult<Vec<Category>> {
        self.get_category(id).await?;
        self.store.find_children(id).await
    }

    /// Proper descendants of the given ancestors, `None` standing for the
    /// roots. See [`DescendantQuery::compose`] for normalization.
    pub async fn children_ids(&self, parent_ids: Option<Vec<Option<i32>>>) -> AppResult<Vec<i32>> {
        let Some(query) = DescendantQuery::compose(parent_ids) else {
            debug!("Empty parent list, skipping descendant lookup");
            return Ok(Vec::new());
        };
        self.store.descendant_ids(&query).await
    }

    /// Updates name/active and optionally moves the category.
    ///
    /// A move is refused when the new parent is the category itself or one
    /// of its descendants. The whole subtree follows the category.
    pub async fn update_category(
        &self,
        id: i32,
        mut changes: UpdateCategory,
    ) -> AppResult<CategoryWithParent> {
        if let Some(name) = changes.name.as_deref() {
            changes.name = Some(require_name(name)?);
        }

        // a parent change rewrites closure edges after a cycle check on
        // them, so concurrent moves must not both commit
        let updated = if changes.parent_id.is_some() {
            self.store
                .serializable_transaction(move |tx| apply_update(tx, id, changes).boxed())
                .await?
        } else {
            self.store
                .transaction(move |tx| apply_update(tx, id, changes).boxed())
                .await?
        };

        info!(category_id = id, "Category updated");
        Ok(updated)
    }

    /// Tombstones a category. Children and closure edges stay in place.
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        if !self.store.soft_delete(id).await? {
            return Err(AppError::category_not_found(id));
        }
        info!(category_id = id, "Category deleted");
        Ok(())
    }

    /// Round trip to the store.
    pub async fn health_check(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
