use thiserror::Error;

/// Violations of the category tree rules.
///
/// `index` is always the 1-based position of the offending record inside a
/// bulk request. Single-category operations report `index: None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error(
        "Ambiguous parent reference in record {index}: parent_id={parent_id} and parent_position={parent_position} are both set"
    )]
    AmbiguousParentReference {
        index: usize,
        parent_id: i32,
        parent_position: i64,
    },

    #[error(
        "Invalid parent position {parent_position} in record {index}: must point to an earlier record"
    )]
    InvalidParentPosition { index: usize, parent_position: i64 },

    #[error("Record {index} has a blank name")]
    BlankName { index: usize },

    #[error("Record {index} has a name of {length} characters, at most {max} are allowed")]
    NameTooLong {
        index: usize,
        length: usize,
        max: usize,
    },

    #[error("Parent category {parent_id} not found{}", record_suffix(.index))]
    ParentNotFound {
        index: Option<usize>,
        parent_id: i32,
    },

    #[error("Moving category {category_id} under {parent_id} would create a cycle")]
    CycleDetected { category_id: i32, parent_id: i32 },
}

fn record_suffix(index: &Option<usize>) -> String {
    index
        .map(|index| format!(" (record {})", index))
        .unwrap_or_default()
}

impl HierarchyError {
    /// Stable machine-readable code used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            HierarchyError::AmbiguousParentReference { .. } => "AMBIGUOUS_PARENT_REFERENCE",
            HierarchyError::InvalidParentPosition { .. } => "INVALID_PARENT_POSITION",
            HierarchyError::BlankName { .. } => "BLANK_NAME",
            HierarchyError::NameTooLong { .. } => "NAME_TOO_LONG",
            HierarchyError::ParentNotFound { .. } => "PARENT_NOT_FOUND",
            HierarchyError::CycleDetected { .. } => "CYCLE_DETECTED",
        }
    }

    /// 1-based record index, when the error came from a batch.
    pub fn index(&self) -> Option<usize> {
        match self {
            HierarchyError::AmbiguousParentReference { index, .. }
            | HierarchyError::InvalidParentPosition { index, .. }
            | HierarchyError::BlankName { index }
            | HierarchyError::NameTooLong { index, .. } => Some(*index),
            HierarchyError::ParentNotFound { index, .. } => *index,
            HierarchyError::CycleDetected { .. } => None,
        }
    }
}
