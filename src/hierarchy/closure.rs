//! Closure table edge arithmetic.
//!
//! Storage backends call into these functions inside the transaction that
//! writes the category row, so the `(ancestor, descendant, depth)` set always
//! mirrors the parent chain of every node.

use std::collections::HashSet;

use crate::models::ClosureEdge;

/// Edges for a freshly inserted node.
///
/// `parent_ancestors` are the edges whose descendant is the new node's
/// parent (its self-pair included); each is extended by one level. A root
/// passes an empty slice and only gets its self-pair.
pub fn insert_edges(id: i32, parent_ancestors: &[ClosureEdge]) -> Vec<ClosureEdge> {
    std::iter::once(ClosureEdge::self_pair(id))
        .chain(parent_ancestors.iter().map(|edge| ClosureEdge {
            ancestor_id: edge.ancestor_id,
            descendant_id: id,
            depth: edge.depth + 1,
        }))
        .collect()
}

/// Ids of every node in a subtree, the subtree root included.
pub fn subtree_ids(subtree: &[ClosureEdge]) -> HashSet<i32> {
    subtree.iter().map(|edge| edge.descendant_id).collect()
}

/// Whether `edge` links an outside ancestor to a node of the moved subtree.
///
/// These are exactly the edges a re-parent has to drop; edges internal to
/// the subtree keep their depth.
pub fn is_detached_edge(edge: &ClosureEdge, subtree: &HashSet<i32>) -> bool {
    subtree.contains(&edge.descendant_id) && !subtree.contains(&edge.ancestor_id)
}

/// Edges joining a moved subtree to its new ancestors.
///
/// `subtree` holds the edges `(n, d, depth_from_n)` rooted at the moved node
/// `n`, `new_parent_ancestors` the edges `(a, p, depth_to_p)` ending at the
/// new parent `p`. Every pair yields `(a, d, depth_to_p + depth_from_n + 1)`.
pub fn reparent_edges(
    subtree: &[ClosureEdge],
    new_parent_ancestors: &[ClosureEdge],
) -> Vec<ClosureEdge> {
    new_parent_ancestors
        .iter()
        .flat_map(|above| {
            subtree.iter().map(move |below| ClosureEdge {
                ancestor_id: above.ancestor_id,
                descendant_id: below.descendant_id,
                depth: above.depth + below.depth + 1,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(ancestor_id: i32, descendant_id: i32, depth: i32) -> ClosureEdge {
        ClosureEdge {
            ancestor_id,
            descendant_id,
            depth,
        }
    }

    fn sorted(mut edges: Vec<ClosureEdge>) -> Vec<ClosureEdge> {
        edges.sort_by_key(|e| (e.ancestor_id, e.descendant_id));
        edges
    }

    #[test]
    fn test_root_gets_only_self_pair() {
        assert_eq!(insert_edges(1, &[]), vec![edge(1, 1, 0)]);
    }

    #[test]
    fn test_child_copies_parent_chain() {
        // 1 -> 2, inserting 3 under 2
        let parent_chain = vec![edge(1, 2, 1), edge(2, 2, 0)];
        assert_eq!(
            sorted(insert_edges(3, &parent_chain)),
            vec![edge(1, 3, 2), edge(2, 3, 1), edge(3, 3, 0)]
        );
    }

    #[test]
    fn test_detached_edges_cross_the_subtree_boundary() {
        let subtree: HashSet<i32> = [3, 5].into_iter().collect();
        assert!(is_detached_edge(&edge(1, 3, 1), &subtree));
        assert!(is_detached_edge(&edge(1, 5, 2), &subtree));
        assert!(!is_detached_edge(&edge(3, 5, 1), &subtree));
        assert!(!is_detached_edge(&edge(5, 5, 0), &subtree));
        assert!(!is_detached_edge(&edge(1, 4, 1), &subtree));
    }

    #[test]
    fn test_reparent_combines_depths() {
        // subtree 3 -> 5 moved under 2, where 2 is a child of root 7
        let subtree = vec![edge(3, 3, 0), edge(3, 5, 1)];
        let above = vec![edge(2, 2, 0), edge(7, 2, 1)];

        assert_eq!(
            sorted(reparent_edges(&subtree, &above)),
            vec![edge(2, 3, 1), edge(2, 5, 2), edge(7, 3, 2), edge(7, 5, 3)]
        );
    }

    #[test]
    fn test_reparent_to_root_adds_nothing() {
        let subtree = vec![edge(3, 3, 0), edge(3, 5, 1)];
        assert!(reparent_edges(&subtree, &[]).is_empty());
        assert_eq!(subtree_ids(&subtree), [3, 5].into_iter().collect());
    }
}
