//! Bulk Hierarchy Builder.
//!
//! A batch is validated as a whole before anything is written, then inserted
//! record by record inside one storage transaction so that a record can name
//! an earlier record of the same batch as its parent.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::hierarchy::HierarchyError;
use crate::models::{
    BatchCategoryRecord, Category, CategoryWithParent, MAX_NAME_LENGTH, NewCategory,
};
use crate::repositories::CategoryTx;

/// Where a batch record's parent comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    Root,
    /// An already persisted category.
    Existing(i32),
    /// Zero-based index of an earlier record in the same batch.
    Position(usize),
}

/// Validates a batch and resolves every record's parent reference.
///
/// Records are scanned in input order and the first violation wins. No I/O
/// happens here.
pub fn plan_batch(records: &[BatchCategoryRecord]) -> Result<Vec<ParentRef>, HierarchyError> {
    records
        .iter()
        .enumerate()
        .map(|(offset, record)| {
            let index = offset + 1;
            let parent = match (record.parent_id, record.parent_position) {
                (Some(parent_id), Some(parent_position)) => {
                    return Err(HierarchyError::AmbiguousParentReference {
                        index,
                        parent_id,
                        parent_position,
                    });
                }
                (None, Some(parent_position)) => {
                    if parent_position < 1 || parent_position >= index as i64 {
                        return Err(HierarchyError::InvalidParentPosition {
                            index,
                            parent_position,
                        });
                    }
                    ParentRef::Position(parent_position as usize - 1)
                }
                (Some(parent_id), None) => ParentRef::Existing(parent_id),
                (None, None) => ParentRef::Root,
            };

            let name = record.name.trim();
            if name.is_empty() {
                return Err(HierarchyError::BlankName { index });
            }
            let length = name.chars().count();
            if length > MAX_NAME_LENGTH {
                return Err(HierarchyError::NameTooLong {
                    index,
                    length,
                    max: MAX_NAME_LENGTH,
                });
            }
            Ok(parent)
        })
        .collect()
}

/// A validated batch, ready to be written through a [`CategoryTx`].
#[derive(Debug, Clone)]
pub struct BulkHierarchyBuilder {
    records: Vec<BatchCategoryRecord>,
    parents: Vec<ParentRef>,
}

impl BulkHierarchyBuilder {
    /// Validates `records`; see [`plan_batch`].
    pub fn plan(records: Vec<BatchCategoryRecord>) -> Result<Self, HierarchyError> {
        let parents = plan_batch(&records)?;
        Ok(Self { records, parents })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persists the batch in input order.
    ///
    /// Existing parents are fetched with a single lookup up front. A parent
    /// id missing from that lookup gets one more point lookup before the
    /// batch is abandoned with [`HierarchyError::ParentNotFound`]. The caller
    /// owns the transaction, so returning an error discards every row written
    /// here.
    pub async fn build(self, tx: &mut dyn CategoryTx) -> AppResult<Vec<CategoryWithParent>> {
        let referenced: BTreeSet<i32> = self
            .parents
            .iter()
            .filter_map(|parent| match parent {
                ParentRef::Existing(id) => Some(*id),
                _ => None,
            })
            .collect();

        let mut known: HashMap<i32, Category> = if referenced.is_empty() {
            HashMap::new()
        } else {
            let ids: Vec<i32> = referenced.into_iter().collect();
            tx.find_by_ids(&ids)
                .await?
                .into_iter()
                .map(|category| (category.id, category))
                .collect()
        };
        debug!(existing_parents = known.len(), "Resolved existing parents");

        let mut created: Vec<Category> = Vec::with_capacity(self.records.len());
        let mut results = Vec::with_capacity(self.records.len());

        for (offset, (record, parent_ref)) in self.records.into_iter().zip(self.parents).enumerate()
        {
            let parent = match parent_ref {
                ParentRef::Root => None,
                // plan_batch only lets positions point backwards
                ParentRef::Position(position) => Some(created.get(position).cloned().ok_or_else(
                    || AppError::Internal {
                        source: anyhow::anyhow!(
                            "record {} references unwritten position {}",
                            offset + 1,
                            position + 1
                        ),
                    },
                )?),
                ParentRef::Existing(parent_id) => {
                    Some(Self::resolve_existing(tx, &known, parent_id, offset + 1).await?)
                }
            };

            let category = tx
                .insert(NewCategory {
                    name: record.name.trim().to_string(),
                    active: record.active.unwrap_or(false),
                    parent_id: parent.as_ref().map(|p| p.id),
                })
                .await?;
            debug!(
                index = offset + 1,
                category_id = category.id,
                parent_id = ?category.parent_id,
                "Created batch category"
            );

            known.insert(category.id, category.clone());
            created.push(category.clone());
            results.push(CategoryWithParent { category, parent });
        }

        info!(created = results.len(), "Bulk category batch written");
        Ok(results)
    }

    async fn resolve_existing(
        tx: &mut dyn CategoryTx,
        known: &HashMap<i32, Category>,
        parent_id: i32,
        index: usize,
    ) -> AppResult<Category> {
        if let Some(parent) = known.get(&parent_id) {
            return Ok(parent.clone());
        }

        match tx.find_by_id(parent_id).await? {
            Some(parent) if parent.is_live() => {
                debug!(parent_id, "Parent resolved by point lookup");
                Ok(parent)
            }
            _ => Err(HierarchyError::ParentNotFound {
                index: Some(index),
                parent_id,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::DescendantQuery;
    use crate::models::{ClosureEdge, UpdateCategory};
    use crate::repositories::{CategoryStore, MemoryCategoryStore};
    use async_trait::async_trait;
    use futures::FutureExt;

    /// Delegates to a real transaction, except that the batched lookup
    /// never returns `hidden`.
    struct HidesFromBatchLookup<'a> {
        inner: &'a mut dyn CategoryTx,
        hidden: i32,
        point_lookups: usize,
    }

    #[async_trait]
    impl CategoryTx for HidesFromBatchLookup<'_> {
        async fn find_by_id(&mut self, id: i32) -> AppResult<Option<Category>> {
            self.point_lookups += 1;
            self.inner.find_by_id(id).await
        }

        async fn find_by_ids(&mut self, ids: &[i32]) -> AppResult<Vec<Category>> {
            let mut found = self.inner.find_by_ids(ids).await?;
            found.retain(|category| category.id != self.hidden);
            Ok(found)
        }

        async fn insert(&mut self, category: NewCategory) -> AppResult<Category> {
            self.inner.insert(category).await
        }

        async fn ancestor_edges(&mut self, id: i32) -> AppResult<Vec<ClosureEdge>> {
            self.inner.ancestor_edges(id).await
        }

        async fn subtree_edges(&mut self, id: i32) -> AppResult<Vec<ClosureEdge>> {
            self.inner.subtree_edges(id).await
        }

        async fn update(&mut self, id: i32, changes: UpdateCategory) -> AppResult<Category> {
            self.inner.update(id, changes).await
        }

        async fn move_subtree(&mut self, id: i32, new_parent: Option<i32>) -> AppResult<()> {
            self.inner.move_subtree(id, new_parent).await
        }

        async fn descendant_ids(&mut self, query: &DescendantQuery) -> AppResult<Vec<i32>> {
            self.inner.descendant_ids(query).await
        }
    }

    fn records() -> Vec<BatchCategoryRecord> {
        vec![
            BatchCategoryRecord::root("A"),
            BatchCategoryRecord::under_position("B", 1),
            BatchCategoryRecord::under_position("C", 2),
        ]
    }

    #[test]
    fn test_plan_resolves_positions_to_zero_based_indexes() {
        assert_eq!(
            plan_batch(&records()).unwrap(),
            vec![
                ParentRef::Root,
                ParentRef::Position(0),
                ParentRef::Position(1)
            ]
        );
    }

    #[test]
    fn test_plan_rejects_ambiguous_reference() {
        let mut batch = records();
        batch[2].parent_id = Some(10);

        assert_eq!(
            plan_batch(&batch),
            Err(HierarchyError::AmbiguousParentReference {
                index: 3,
                parent_id: 10,
                parent_position: 2
            })
        );
    }

    #[test]
    fn test_plan_rejects_self_and_forward_positions() {
        for position in [2, 3] {
            let batch = vec![
                BatchCategoryRecord::root("A"),
                BatchCategoryRecord::under_position("B", position),
            ];
            assert_eq!(
                plan_batch(&batch),
                Err(HierarchyError::InvalidParentPosition {
                    index: 2,
                    parent_position: position
                })
            );
        }
    }

    #[test]
    fn test_plan_rejects_non_positive_positions() {
        for position in [0, -1] {
            let batch = vec![
                BatchCategoryRecord::root("A"),
                BatchCategoryRecord::under_position("B", position),
            ];
            assert!(matches!(
                plan_batch(&batch),
                Err(HierarchyError::InvalidParentPosition { index: 2, .. })
            ));
        }
    }

    #[test]
    fn test_plan_reports_first_failing_record() {
        let batch = vec![
            BatchCategoryRecord::root("A"),
            BatchCategoryRecord::root("  "),
            BatchCategoryRecord::under_position("C", 7),
        ];
        assert_eq!(
            plan_batch(&batch),
            Err(HierarchyError::BlankName { index: 2 })
        );
    }

    #[test]
    fn test_plan_bounds_name_length_in_characters() {
        let longest = "é".repeat(MAX_NAME_LENGTH);
        let batch = vec![
            BatchCategoryRecord::root(format!("  {longest}  ")),
            BatchCategoryRecord::under_position("x".repeat(MAX_NAME_LENGTH + 45), 1),
        ];

        assert_eq!(
            plan_batch(&batch),
            Err(HierarchyError::NameTooLong {
                index: 2,
                length: 300,
                max: MAX_NAME_LENGTH
            })
        );
        assert!(plan_batch(&batch[..1]).is_ok());
    }

    #[tokio::test]
    async fn test_build_creates_chain_with_resolved_parents() {
        let store = MemoryCategoryStore::new();
        let builder = BulkHierarchyBuilder::plan(records()).unwrap();

        let created = store
            .transaction(move |tx| builder.build(tx).boxed())
            .await
            .unwrap();

        assert_eq!(created.len(), 3);
        assert!(created[0].parent.is_none());
        assert_eq!(
            created[1].parent.as_ref().map(|p| p.id),
            Some(created[0].category.id)
        );
        assert_eq!(
            created[2].category.parent_id,
            Some(created[1].category.id)
        );
        assert!(created.iter().all(|c| !c.category.active));
    }

    #[tokio::test]
    async fn test_build_fails_on_unknown_parent() {
        let store = MemoryCategoryStore::new();
        let builder = BulkHierarchyBuilder::plan(vec![
            BatchCategoryRecord::root("A"),
            BatchCategoryRecord::under_id("B", 404),
        ])
        .unwrap();

        let err = store
            .transaction(move |tx| builder.build(tx).boxed())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Hierarchy(HierarchyError::ParentNotFound {
                index: Some(2),
                parent_id: 404
            })
        ));
        assert_eq!(store.list_live(0, 10).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_build_falls_back_to_point_lookup_for_missed_parent() {
        let store = MemoryCategoryStore::new();
        let parent = store
            .transaction(|tx| {
                async move {
                    tx.insert(NewCategory {
                        name: "Books".to_string(),
                        active: true,
                        parent_id: None,
                    })
                    .await
                }
                .boxed()
            })
            .await
            .unwrap();
        let builder = BulkHierarchyBuilder::plan(vec![
            BatchCategoryRecord::under_id("Fiction", parent.id),
            BatchCategoryRecord::under_position("Poetry", 1),
        ])
        .unwrap();

        let hidden = parent.id;
        let (created, point_lookups) = store
            .transaction(move |tx| {
                async move {
                    let mut tx = HidesFromBatchLookup {
                        inner: tx,
                        hidden,
                        point_lookups: 0,
                    };
                    let created = builder.build(&mut tx).await?;
                    Ok::<_, AppError>((created, tx.point_lookups))
                }
                .boxed()
            })
            .await
            .unwrap();

        assert_eq!(point_lookups, 1);
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].category.parent_id, Some(parent.id));
        assert_eq!(created[0].parent.as_ref().map(|p| p.id), Some(parent.id));
        assert_eq!(
            created[1].category.parent_id,
            Some(created[0].category.id)
        );
        let edges = store.closure_edges().await;
        assert!(edges.contains(&ClosureEdge {
            ancestor_id: parent.id,
            descendant_id: created[1].category.id,
            depth: 2,
        }));
    }
}
