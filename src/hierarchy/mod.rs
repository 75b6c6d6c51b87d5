//! Category hierarchy engine.
//!
//! Categories form a forest backed by a closure table holding every
//! `(ancestor, descendant, depth)` pair, self-pairs included.

pub mod bulk;
pub mod closure;
pub mod descendants;
mod error;

pub use bulk::{BulkHierarchyBuilder, ParentRef, plan_batch};
pub use descendants::{ClosureClause, DescendantQuery};
pub use error::HierarchyError;
