//! Storage contracts consumed by the hierarchy engine and the service layer.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::AppResult;
use crate::hierarchy::DescendantQuery;
use crate::models::{Category, ClosureEdge, NewCategory, UpdateCategory};

/// Operations available inside one open storage transaction.
///
/// Every write keeps the closure table consistent with the `parent_id`
/// column before returning.
#[async_trait]
pub trait CategoryTx: Send {
    /// Point lookup, tombstoned rows included.
    async fn find_by_id(&mut self, id: i32) -> AppResult<Option<Category>>;

    /// Set lookup of live categories. Unknown ids are skipped.
    async fn find_by_ids(&mut self, ids: &[i32]) -> AppResult<Vec<Category>>;

    /// Inserts the row together with its closure edges.
    async fn insert(&mut self, category: NewCategory) -> AppResult<Category>;

    /// Edges ending at `id`: its self-pair and one per proper ancestor.
    async fn ancestor_edges(&mut self, id: i32) -> AppResult<Vec<ClosureEdge>>;

    /// Edges starting at `id`: its self-pair and one per proper descendant.
    async fn subtree_edges(&mut self, id: i32) -> AppResult<Vec<ClosureEdge>>;

    /// Applies column changes only. Re-parenting also needs [`move_subtree`].
    ///
    /// [`move_subtree`]: CategoryTx::move_subtree
    async fn update(&mut self, id: i32, changes: UpdateCategory) -> AppResult<Category>;

    /// Rewrites the closure edges of the subtree rooted at `id` so that it
    /// hangs below `new_parent` (or becomes a root tree).
    async fn move_subtree(&mut self, id: i32, new_parent: Option<i32>) -> AppResult<()>;

    /// Live category ids matching `query`, ascending.
    async fn descendant_ids(&mut self, query: &DescendantQuery) -> AppResult<Vec<i32>>;
}

/// A category storage engine.
///
/// Implementations are cheap to clone and shareable across request tasks.
#[async_trait]
pub trait CategoryStore: Clone + Send + Sync + 'static {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Category>>;

    /// One page of live categories ordered by id, plus the live total.
    async fn list_live(&self, offset: i64, limit: i64) -> AppResult<(Vec<Category>, i64)>;

    /// Live categories whose parent is `parent_id`, ordered by id.
    async fn find_children(&self, parent_id: i32) -> AppResult<Vec<Category>>;

    async fn descendant_ids(&self, query: &DescendantQuery) -> AppResult<Vec<i32>>;

    /// Tombstones a live category. Returns `false` when there was no live
    /// row to delete.
    async fn soft_delete(&self, id: i32) -> AppResult<bool>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> AppResult<()>;

    /// Runs `work` atomically. Any error returned by `work` discards every
    /// write it made.
    async fn transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn CategoryTx) -> BoxFuture<'c, AppResult<T>> + Send + 'static;

    /// Like [`transaction`], but two concurrent units that read and rewrite
    /// overlapping parts of the closure table cannot both commit: one of them
    /// fails with [`AppError::Conflict`](crate::error::AppError::Conflict).
    ///
    /// Re-parenting runs here so that a cycle check cannot be invalidated by
    /// a concurrent move. Stores that already run one transaction at a time
    /// can keep the default.
    ///
    /// [`transaction`]: CategoryStore::transaction
    async fn serializable_transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn CategoryTx) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
    {
        self.transaction(work).await
    }
}
