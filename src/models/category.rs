use diesel::prelude::*;
use jiff_diesel::DateTime;
use serde::Deserialize;

/// Category row as stored in the `categories` table.
///
/// `parent_id` is a plain reference: a category never owns its parent, and
/// tombstoning a parent leaves its children untouched.
#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub active: bool,
    pub parent_id: Option<i32>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub deleted_at: Option<DateTime>,
}

impl Category {
    /// Whether the category has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Whether the category sits at the top of the tree.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A category together with its resolved parent entity.
#[derive(Debug, Clone)]
pub struct CategoryWithParent {
    pub category: Category,
    pub parent: Option<Category>,
}

/// Longest category name, in characters; mirrors `VARCHAR(255)`.
pub const MAX_NAME_LENGTH: usize = 255;

/// NewCategory model for inserting new records
#[derive(Debug, Insertable, Deserialize, Clone)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub active: bool,
    pub parent_id: Option<i32>,
}

/// UpdateCategory model for partial updates.
///
/// `parent_id: Some(None)` moves the category to the root level, `None`
/// leaves the parent untouched.
#[derive(Debug, AsChangeset, Deserialize, Clone, Default)]
#[diesel(table_name = crate::schema::categories)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub parent_id: Option<Option<i32>>,
}

impl UpdateCategory {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.active.is_none() && self.parent_id.is_none()
    }
}

/// One `(ancestor, descendant)` pair of the closure table.
///
/// `depth` is 0 for the self-pair, 1 for the direct parent and grows by one
/// per level.
#[derive(Debug, Queryable, Selectable, Insertable, Clone, Copy, PartialEq, Eq, Hash)]
#[diesel(table_name = crate::schema::category_closure)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClosureEdge {
    pub ancestor_id: i32,
    pub descendant_id: i32,
    pub depth: i32,
}

impl ClosureEdge {
    pub fn self_pair(id: i32) -> Self {
        Self {
            ancestor_id: id,
            descendant_id: id,
            depth: 0,
        }
    }

    pub fn is_self_pair(&self) -> bool {
        self.ancestor_id == self.descendant_id
    }
}

/// Input record of a bulk creation call.
///
/// At most one of `parent_id` (an existing category) or `parent_position`
/// (1-based index of an earlier record of the same batch) may be set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BatchCategoryRecord {
    pub name: String,
    pub active: Option<bool>,
    pub parent_id: Option<i32>,
    pub parent_position: Option<i64>,
}

impl BatchCategoryRecord {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn under_id(name: impl Into<String>, parent_id: i32) -> Self {
        Self {
            name: name.into(),
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    pub fn under_position(name: impl Into<String>, parent_position: i64) -> Self {
        Self {
            name: name.into(),
            parent_position: Some(parent_position),
            ..Default::default()
        }
    }
}
