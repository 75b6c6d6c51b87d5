use std::sync::OnceLock;

use regex::Regex;

/// Tables whose constraint names the parser understands, longest first so
/// `category_closure_*` is not mistaken for a `categor*` prefix.
const KNOWN_TABLES: &[&str] = &["category_closure", "categories"];

/// Kind of constraint encoded in the PostgreSQL default suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
}

/// Decomposed constraint name such as `categories_parent_id_fkey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintName {
    pub table: String,
    pub column: Option<String>,
    pub kind: ConstraintKind,
}

/// Utility for parsing PostgreSQL constraint violation messages.
pub struct ConstraintParser;

struct RegexPatterns {
    key_value: Regex,
    column_name: Regex,
    relation_name: Regex,
}

impl RegexPatterns {
    fn new() -> Self {
        // Literal patterns: compilation cannot fail
        Self {
            // "Key (parent_id)=(42)"
            key_value: Regex::new(r"Key \(([^)]+)\)=\(([^)]*)\)").expect("valid key/value regex"),
            // `column "name"`
            column_name: Regex::new(r#"column "([^"]+)""#).expect("valid column regex"),
            // `table "categories"` or `relation "categories"`
            relation_name: Regex::new(r#"(?:table|relation) "([^"]+)""#)
                .expect("valid relation regex"),
        }
    }
}

static REGEX_PATTERNS: OnceLock<RegexPatterns> = OnceLock::new();

impl ConstraintParser {
    fn patterns() -> &'static RegexPatterns {
        REGEX_PATTERNS.get_or_init(RegexPatterns::new)
    }

    /// Splits a default-named constraint into table, column and kind.
    ///
    /// ```text
    /// categories_parent_id_fkey -> (categories, Some(parent_id), ForeignKey)
    /// category_closure_pkey     -> (category_closure, None, PrimaryKey)
    /// ```
    pub fn parse_constraint_name(constraint_name: &str) -> Option<ConstraintName> {
        let (rest, kind) = if let Some(rest) = constraint_name.strip_suffix("_pkey") {
            (rest, ConstraintKind::PrimaryKey)
        } else if let Some(rest) = constraint_name.strip_suffix("_fkey") {
            (rest, ConstraintKind::ForeignKey)
        } else if let Some(rest) = constraint_name.strip_suffix("_key") {
            (rest, ConstraintKind::Unique)
        } else if let Some(rest) = constraint_name.strip_suffix("_check") {
            (rest, ConstraintKind::Check)
        } else {
            return None;
        };

        let table = KNOWN_TABLES
            .iter()
            .find(|table| rest == **table || rest.starts_with(&format!("{}_", table)))?;

        let column = rest
            .strip_prefix(*table)
            .and_then(|c| c.strip_prefix('_'))
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Some(ConstraintName {
            table: table.to_string(),
            column,
            kind,
        })
    }

    /// Extracts `(column, value)` from a `Key (column)=(value)` detail line.
    pub fn extract_key_value_from_message(message: &str) -> Option<(String, String)> {
        Self::patterns().key_value.captures(message).and_then(|caps| {
            let field = caps.get(1)?.as_str().to_string();
            let value = caps.get(2)?.as_str().to_string();
            Some((field, value))
        })
    }

    /// Extracts the quoted column name of a not-null violation.
    pub fn extract_column_from_message(message: &str) -> Option<String> {
        Self::patterns()
            .column_name
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Extracts the first quoted table/relation name.
    pub fn extract_table_from_message(message: &str) -> Option<String> {
        Self::patterns()
            .relation_name
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_foreign_key_on_categories() {
        let parsed = ConstraintParser::parse_constraint_name("categories_parent_id_fkey").unwrap();
        assert_eq!(parsed.table, "categories");
        assert_eq!(parsed.column.as_deref(), Some("parent_id"));
        assert_eq!(parsed.kind, ConstraintKind::ForeignKey);
    }

    #[test]
    fn test_parse_closure_primary_key() {
        let parsed = ConstraintParser::parse_constraint_name("category_closure_pkey").unwrap();
        assert_eq!(parsed.table, "category_closure");
        assert_eq!(parsed.column, None);
        assert_eq!(parsed.kind, ConstraintKind::PrimaryKey);
    }

    #[test]
    fn test_parse_closure_foreign_key_is_not_confused_with_categories() {
        let parsed =
            ConstraintParser::parse_constraint_name("category_closure_descendant_id_fkey").unwrap();
        assert_eq!(parsed.table, "category_closure");
        assert_eq!(parsed.column.as_deref(), Some("descendant_id"));
    }

    #[test]
    fn test_parse_check_constraint() {
        let parsed = ConstraintParser::parse_constraint_name("categories_name_check").unwrap();
        assert_eq!(parsed.column.as_deref(), Some("name"));
        assert_eq!(parsed.kind, ConstraintKind::Check);
    }

    #[test]
    fn test_unknown_constraint_names() {
        assert_eq!(ConstraintParser::parse_constraint_name("users_email_key"), None);
        assert_eq!(ConstraintParser::parse_constraint_name("categories_name_idx"), None);
    }

    #[test]
    fn test_extract_key_value_from_message() {
        let message = "insert or update on table \"categories\" violates foreign key constraint \"categories_parent_id_fkey\"\nDETAIL: Key (parent_id)=(999) is not present in table \"categories\".";
        assert_eq!(
            ConstraintParser::extract_key_value_from_message(message),
            Some(("parent_id".to_string(), "999".to_string()))
        );
        assert_eq!(
            ConstraintParser::extract_table_from_message(message),
            Some("categories".to_string())
        );
    }

    #[test]
    fn test_extract_column_from_message() {
        let message = "null value in column \"name\" of relation \"categories\" violates not-null constraint";
        assert_eq!(
            ConstraintParser::extract_column_from_message(message),
            Some("name".to_string())
        );
        assert_eq!(
            ConstraintParser::extract_table_from_message(message),
            Some("categories".to_string())
        );
    }
}
