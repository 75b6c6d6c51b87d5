//! In-process category store.
//!
//! Transactions work on a cloned snapshot of the whole state and swap it in
//! on success, so a failed batch leaves nothing behind. Every trait call is
//! counted, which lets tests assert that a code path never touched storage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::hierarchy::{DescendantQuery, HierarchyError, closure};
use crate::models::{Category, ClosureEdge, MAX_NAME_LENGTH, NewCategory, UpdateCategory};
use crate::repositories::{CategoryStore, CategoryTx};

fn now() -> jiff_diesel::DateTime {
    jiff::Timestamp::now()
        .to_zoned(jiff::tz::TimeZone::UTC)
        .datetime()
        .into()
}

/// Same rules as the `name` column: non-empty, at most `VARCHAR(255)`.
fn check_name_column(name: &str) -> AppResult<()> {
    let reason = if name.is_empty() {
        "Check constraint failed for name".to_string()
    } else if name.chars().count() > MAX_NAME_LENGTH {
        format!("Value too long for name, at most {MAX_NAME_LENGTH} characters")
    } else {
        return Ok(());
    };
    Err(AppError::Validation {
        field: "name".to_string(),
        reason,
    })
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    categories: BTreeMap<i32, Category>,
    /// `(ancestor_id, descendant_id) -> depth`
    edges: BTreeMap<(i32, i32), i32>,
    last_id: i32,
}

impl MemoryState {
    fn find_by_id(&self, id: i32) -> Option<Category> {
        self.categories.get(&id).cloned()
    }

    fn find_by_ids(&self, ids: &[i32]) -> Vec<Category> {
        let wanted: BTreeSet<i32> = ids.iter().copied().collect();
        wanted
            .into_iter()
            .filter_map(|id| self.categories.get(&id))
            .filter(|c| c.is_live())
            .cloned()
            .collect()
    }

    fn require_parent(&self, parent_id: Option<i32>) -> AppResult<()> {
        match parent_id {
            Some(parent_id) if !self.categories.contains_key(&parent_id) => {
                Err(HierarchyError::ParentNotFound {
                    index: None,
                    parent_id,
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    fn insert(&mut self, new: NewCategory) -> AppResult<Category> {
        check_name_column(&new.name)?;
        self.require_parent(new.parent_id)?;

        self.last_id += 1;
        let created_at = now();
        let category = Category {
            id: self.last_id,
            name: new.name,
            active: new.active,
            parent_id: new.parent_id,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        };

        let parent_chain = match category.parent_id {
            Some(parent_id) => self.ancestor_edges(parent_id),
            None => Vec::new(),
        };
        self.put_edges(closure::insert_edges(category.id, &parent_chain));
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    fn put_edges(&mut self, edges: Vec<ClosureEdge>) {
        for edge in edges {
            self.edges
                .insert((edge.ancestor_id, edge.descendant_id), edge.depth);
        }
    }

    fn all_edges(&self) -> impl Iterator<Item = ClosureEdge> + '_ {
        self.edges
            .iter()
            .map(|(&(ancestor_id, descendant_id), &depth)| ClosureEdge {
                ancestor_id,
                descendant_id,
                depth,
            })
    }

    fn ancestor_edges(&self, id: i32) -> Vec<ClosureEdge> {
        self.all_edges().filter(|e| e.descendant_id == id).collect()
    }

    fn subtree_edges(&self, id: i32) -> Vec<ClosureEdge> {
        self.all_edges().filter(|e| e.ancestor_id == id).collect()
    }

    fn update(&mut self, id: i32, changes: UpdateCategory) -> AppResult<Category> {
        if let Some(name) = changes.name.as_deref() {
            check_name_column(name)?;
        }
        if let Some(parent_id) = changes.parent_id {
            self.require_parent(parent_id)?;
        }
        let category = self
            .categories
            .get_mut(&id)
            .ok_or_else(|| AppError::category_not_found(id))?;

        if let Some(name) = changes.name {
            category.name = name;
        }
        if let Some(active) = changes.active {
            category.active = active;
        }
        if let Some(parent_id) = changes.parent_id {
            category.parent_id = parent_id;
        }
        category.updated_at = now();
        Ok(category.clone())
    }

    fn move_subtree(&mut self, id: i32, new_parent: Option<i32>) {
        let subtree = self.subtree_edges(id);
        let members = closure::subtree_ids(&subtree);
        self.edges.retain(|&(ancestor_id, descendant_id), depth| {
            let edge = ClosureEdge {
                ancestor_id,
                descendant_id,
                depth: *depth,
            };
            !closure::is_detached_edge(&edge, &members)
        });

        let above = match new_parent {
            Some(parent_id) => self.ancestor_edges(parent_id),
            None => Vec::new(),
        };
        self.put_edges(closure::reparent_edges(&subtree, &above));
    }

    fn descendant_ids(&self, query: &DescendantQuery) -> Vec<i32> {
        let is_root = |id: i32| self.categories.get(&id).is_some_and(Category::is_root);
        let ids: BTreeSet<i32> = self
            .all_edges()
            .filter(|edge| query.matches(edge, is_root))
            .map(|edge| edge.descendant_id)
            .filter(|id| self.categories.get(id).is_some_and(Category::is_live))
            .collect();
        ids.into_iter().collect()
    }
}

/// Category store kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCategoryStore {
    state: Arc<Mutex<MemoryState>>,
    calls: Arc<AtomicUsize>,
    serializable: Arc<AtomicUsize>,
}

impl MemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of storage calls served so far, transactional ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many units of work went through
    /// [`CategoryStore::serializable_transaction`].
    pub fn serializable_transactions(&self) -> usize {
        self.serializable.load(Ordering::SeqCst)
    }

    /// Every stored closure edge, ordered by `(ancestor_id, descendant_id)`.
    pub async fn closure_edges(&self) -> Vec<ClosureEdge> {
        self.state.lock().await.all_edges().collect()
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Category>> {
        self.count();
        Ok(self.state.lock().await.find_by_id(id))
    }

    async fn list_live(&self, offset: i64, limit: i64) -> AppResult<(Vec<Category>, i64)> {
        self.count();
        let state = self.state.lock().await;
        let live: Vec<&Category> = state.categories.values().filter(|c| c.is_live()).collect();
        let total = live.len() as i64;
        let page = live
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_children(&self, parent_id: i32) -> AppResult<Vec<Category>> {
        self.count();
        let state = self.state.lock().await;
        Ok(state
            .categories
            .values()
            .filter(|c| c.is_live() && c.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn descendant_ids(&self, query: &DescendantQuery) -> AppResult<Vec<i32>> {
        self.count();
        Ok(self.state.lock().await.descendant_ids(query))
    }

    async fn soft_delete(&self, id: i32) -> AppResult<bool> {
        self.count();
        let mut state = self.state.lock().await;
        match state.categories.get_mut(&id) {
            Some(category) if category.is_live() => {
                let deleted_at = now();
                category.deleted_at = Some(deleted_at);
                category.updated_at = deleted_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> AppResult<()> {
        self.count();
        Ok(())
    }

    async fn transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn CategoryTx) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
    {
        self.count();
        let mut committed = self.state.lock().await;
        let mut tx = MemoryCategoryTx {
            state: committed.clone(),
            calls: self.calls.clone(),
        };

        let result = work(&mut tx).await;
        if result.is_ok() {
            *committed = tx.state;
        }
        result
    }

    /// The state lock is held for the whole unit of work, so every
    /// transaction here is already serial.
    async fn serializable_transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn CategoryTx) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
    {
        self.serializable.fetch_add(1, Ordering::SeqCst);
        self.transaction(work).await
    }
}

/// Snapshot handed to transaction closures.
struct MemoryCategoryTx {
    state: MemoryState,
    calls: Arc<AtomicUsize>,
}

impl MemoryCategoryTx {
    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CategoryTx for MemoryCategoryTx {
    async fn find_by_id(&mut self, id: i32) -> AppResult<Option<Category>> {
        self.count();
        Ok(self.state.find_by_id(id))
    }

    async fn find_by_ids(&mut self, ids: &[i32]) -> AppResult<Vec<Category>> {
        self.count();
        Ok(self.state.find_by_ids(ids))
    }

    async fn insert(&mut self, category: NewCategory) -> AppResult<Category> {
        self.count();
        self.state.insert(category)
    }

    async fn ancestor_edges(&mut self, id: i32) -> AppResult<Vec<ClosureEdge>> {
        self.count();
        Ok(self.state.ancestor_edges(id))
    }

    async fn subtree_edges(&mut self, id: i32) -> AppResult<Vec<ClosureEdge>> {
        self.count();
        Ok(self.state.subtree_edges(id))
    }

    async fn update(&mut self, id: i32, changes: UpdateCategory) -> AppResult<Category> {
        self.count();
        self.state.update(id, changes)
    }

    async fn move_subtree(&mut self, id: i32, new_parent: Option<i32>) -> AppResult<()> {
        self.count();
        self.state.move_subtree(id, new_parent);
        Ok(())
    }

    async fn descendant_ids(&mut self, query: &DescendantQuery) -> AppResult<Vec<i32>> {
        self.count();
        Ok(self.state.descendant_ids(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    async fn insert(store: &MemoryCategoryStore, name: &str, parent_id: Option<i32>) -> Category {
        let new = NewCategory {
            name: name.to_string(),
            active: true,
            parent_id,
        };
        store
            .transaction(move |tx| async move { tx.insert(new).await }.boxed())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_writes_self_pair_and_parent_chain() {
        let store = MemoryCategoryStore::new();
        let root = insert(&store, "root", None).await;
        let child = insert(&store, "child", Some(root.id)).await;
        let grandchild = insert(&store, "grandchild", Some(child.id)).await;

        let edges: Vec<(i32, i32, i32)> = store
            .closure_edges()
            .await
            .into_iter()
            .map(|e| (e.ancestor_id, e.descendant_id, e.depth))
            .collect();

        assert_eq!(
            edges,
            vec![
                (root.id, root.id, 0),
                (root.id, child.id, 1),
                (root.id, grandchild.id, 2),
                (child.id, child.id, 0),
                (child.id, grandchild.id, 1),
                (grandchild.id, grandchild.id, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_transaction_discards_writes() {
        let store = MemoryCategoryStore::new();
        insert(&store, "kept", None).await;

        let result: AppResult<()> = store
            .transaction(|tx| {
                async move {
                    tx.insert(NewCategory {
                        name: "dropped".to_string(),
                        active: false,
                        parent_id: None,
                    })
                    .await?;
                    Err::<(), AppError>(AppError::category_not_found(42))
                }
                .boxed()
            })
            .await;

        assert!(result.is_err());
        let (live, total) = store.list_live(0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(live[0].name, "kept");
        assert_eq!(store.closure_edges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_under_unknown_parent_fails() {
        let store = MemoryCategoryStore::new();
        let new = NewCategory {
            name: "orphan".to_string(),
            active: false,
            parent_id: Some(7),
        };

        let err = store
            .transaction(move |tx| async move { tx.insert(new).await }.boxed())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Hierarchy(HierarchyError::ParentNotFound { parent_id: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_name_column_limits_match_postgres() {
        let store = MemoryCategoryStore::new();
        let longest = insert(&store, &"x".repeat(MAX_NAME_LENGTH), None).await;
        assert_eq!(longest.name.chars().count(), MAX_NAME_LENGTH);

        let new = NewCategory {
            name: "x".repeat(MAX_NAME_LENGTH + 1),
            active: false,
            parent_id: None,
        };
        let err = store
            .transaction(move |tx| async move { tx.insert(new).await }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));

        let rename = UpdateCategory {
            name: Some("y".repeat(MAX_NAME_LENGTH + 1)),
            ..Default::default()
        };
        let err = store
            .transaction(move |tx| async move { tx.update(longest.id, rename).await }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_soft_delete_only_hits_live_rows() {
        let store = MemoryCategoryStore::new();
        let category = insert(&store, "gone", None).await;

        assert!(store.soft_delete(category.id).await.unwrap());
        assert!(!store.soft_delete(category.id).await.unwrap());
        assert!(!store.soft_delete(999).await.unwrap());

        let stored = store.find_by_id(category.id).await.unwrap().unwrap();
        assert!(!stored.is_live());
        // tombstoned rows keep their edges
        assert_eq!(store.closure_edges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_calls_are_counted() {
        let store = MemoryCategoryStore::new();
        assert_eq!(store.calls(), 0);
        store.ping().await.unwrap();
        store.find_children(1).await.unwrap();
        assert_eq!(store.calls(), 2);
    }
}
