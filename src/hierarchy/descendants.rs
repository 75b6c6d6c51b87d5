//! Descendant Query Composer.
//!
//! Turns the caller's list of candidate ancestors (where `None` stands for
//! "the roots") into a small set of closure-table clauses joined by `OR`.
//! Backends only render the clauses; all branching lives in
//! [`DescendantQuery::from_parts`].

use std::collections::BTreeSet;

use crate::models::ClosureEdge;

/// One filter over `category_closure` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureClause {
    /// `ancestor_id IN ids AND ancestor_id <> descendant_id`
    AncestorIn(Vec<i32>),
    /// Self-pairs of categories with no parent, minus `excluding`.
    IsRoot { excluding: Vec<i32> },
    /// Every proper edge. Unreachable after normalization.
    AnyProper,
}

impl ClosureClause {
    /// Evaluates the clause against one edge.
    ///
    /// `is_root` reports whether a category id currently has no parent.
    pub fn matches(&self, edge: &ClosureEdge, is_root: impl Fn(i32) -> bool) -> bool {
        match self {
            ClosureClause::AncestorIn(ids) => {
                !edge.is_self_pair() && ids.contains(&edge.ancestor_id)
            }
            ClosureClause::IsRoot { excluding } => {
                edge.is_self_pair()
                    && is_root(edge.descendant_id)
                    && !excluding.contains(&edge.descendant_id)
            }
            ClosureClause::AnyProper => !edge.is_self_pair(),
        }
    }
}

/// A composed descendant lookup, ready to be rendered by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescendantQuery {
    clauses: Vec<ClosureClause>,
}

impl DescendantQuery {
    /// Normalizes the raw argument and builds the clause list.
    ///
    /// - `None` is read as `[None]`, i.e. the roots.
    /// - An empty list yields `None`: nothing to ask the store.
    /// - Duplicates collapse, `None` included.
    pub fn compose(parent_ids: Option<Vec<Option<i32>>>) -> Option<Self> {
        let parent_ids = parent_ids.unwrap_or_else(|| vec![None]);
        if parent_ids.is_empty() {
            return None;
        }

        let include_roots = parent_ids.iter().any(Option::is_none);
        let ids: BTreeSet<i32> = parent_ids.into_iter().flatten().collect();

        Some(Self::from_parts(ids.into_iter().collect(), include_roots))
    }

    /// Decision table over `(ids, include_roots)`.
    ///
    /// | ids       | roots | clauses                                  |
    /// |-----------|-------|------------------------------------------|
    /// | non-empty | yes   | `AncestorIn(ids) OR IsRoot{excluding: ids}` |
    /// | non-empty | no    | `AncestorIn(ids)`                        |
    /// | empty     | yes   | `IsRoot{excluding: []}`                  |
    /// | empty     | no    | `AnyProper`                              |
    pub fn from_parts(ids: Vec<i32>, include_roots: bool) -> Self {
        let clauses = match (ids.is_empty(), include_roots) {
            (false, true) => vec![
                ClosureClause::AncestorIn(ids.clone()),
                ClosureClause::IsRoot { excluding: ids },
            ],
            (false, false) => vec![ClosureClause::AncestorIn(ids)],
            (true, true) => vec![ClosureClause::IsRoot {
                excluding: Vec::new(),
            }],
            (true, false) => vec![ClosureClause::AnyProper],
        };
        Self { clauses }
    }

    /// Proper descendants of a single category.
    pub fn of(id: i32) -> Self {
        Self::from_parts(vec![id], false)
    }

    pub fn clauses(&self) -> &[ClosureClause] {
        &self.clauses
    }

    /// `OR` over all clauses.
    pub fn matches(&self, edge: &ClosureEdge, is_root: impl Fn(i32) -> bool) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.matches(edge, &is_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_means_roots() {
        let expected = DescendantQuery::compose(Some(vec![None]));
        assert_eq!(DescendantQuery::compose(None), expected);
        assert_eq!(
            expected.unwrap().clauses(),
            &[ClosureClause::IsRoot {
                excluding: vec![]
            }]
        );
    }

    #[test]
    fn test_empty_list_issues_no_query() {
        assert_eq!(DescendantQuery::compose(Some(vec![])), None);
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(
            DescendantQuery::compose(Some(vec![Some(4), Some(4), None, None, Some(2)])),
            DescendantQuery::compose(Some(vec![Some(2), None, Some(4)]))
        );
    }

    #[test]
    fn test_ids_with_roots_excludes_requested_ids_from_root_clause() {
        let query = DescendantQuery::compose(Some(vec![Some(1), None])).unwrap();
        assert_eq!(
            query.clauses(),
            &[
                ClosureClause::AncestorIn(vec![1]),
                ClosureClause::IsRoot {
                    excluding: vec![1]
                },
            ]
        );
    }

    #[test]
    fn test_only_ids() {
        let query = DescendantQuery::compose(Some(vec![Some(3), Some(1)])).unwrap();
        assert_eq!(query.clauses(), &[ClosureClause::AncestorIn(vec![1, 3])]);
        assert_eq!(query, DescendantQuery::from_parts(vec![1, 3], false));
    }

    #[test]
    fn test_fallback_branch_matches_every_proper_edge() {
        let query = DescendantQuery::from_parts(vec![], false);
        assert_eq!(query.clauses(), &[ClosureClause::AnyProper]);

        let proper = ClosureEdge {
            ancestor_id: 1,
            descendant_id: 2,
            depth: 1,
        };
        assert!(query.matches(&proper, |_| false));
        assert!(!query.matches(&ClosureEdge::self_pair(1), |_| true));
    }

    #[test]
    fn test_clause_evaluation() {
        let roots = |id: i32| id == 1 || id == 2;
        let query = DescendantQuery::compose(Some(vec![Some(1), None])).unwrap();

        // 1 -> 3
        let child = ClosureEdge {
            ancestor_id: 1,
            descendant_id: 3,
            depth: 1,
        };
        assert!(query.matches(&child, roots));
        assert!(query.matches(&ClosureEdge::self_pair(2), roots));
        // requested root is not its own child
        assert!(!query.matches(&ClosureEdge::self_pair(1), roots));
        assert!(!query.matches(&ClosureEdge::self_pair(3), roots));
    }
}
