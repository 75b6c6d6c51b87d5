use crate::error::constraint_parser::{ConstraintKind, ConstraintName};
use crate::error::{AppError, ConstraintParser};
use crate::hierarchy::HierarchyError;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// Utility for converting database errors to structured AppError variants.
///
/// Constraint names of the `categories` and `category_closure` tables are
/// recognised and mapped onto the category domain. Anything else becomes a
/// generic [`AppError::Database`].
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// # Arguments
    /// * `error` - The Diesel error to convert
    /// * `operation` - Description of the database operation that failed
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.as_ref(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        info: &(dyn DatabaseErrorInformation + Send + Sync),
        operation: &str,
    ) -> AppError {
        let message = info.message();
        // PostgreSQL puts "Key (col)=(value)" into the detail line
        let detail = info.details().unwrap_or(message);
        let constraint = info
            .constraint_name()
            .and_then(ConstraintParser::parse_constraint_name);

        match (kind, constraint) {
            (
                DatabaseErrorKind::ForeignKeyViolation,
                Some(ConstraintName {
                    ref table,
                    column: Some(ref column),
                    kind: ConstraintKind::ForeignKey,
                }),
            ) if table == "categories" && column == "parent_id" => {
                let parent_id = ConstraintParser::extract_key_value_from_message(detail)
                    .and_then(|(_, value)| value.parse::<i32>().ok());
                match parent_id {
                    Some(parent_id) => AppError::Hierarchy(HierarchyError::ParentNotFound {
                        index: None,
                        parent_id,
                    }),
                    None => AppError::Validation {
                        field: "parent_id".to_string(),
                        reason: "Referenced parent category does not exist".to_string(),
                    },
                }
            }
            (
                DatabaseErrorKind::CheckViolation,
                Some(ConstraintName {
                    column: Some(column),
                    kind: ConstraintKind::Check,
                    ..
                }),
            ) => AppError::Validation {
                reason: format!("Check constraint failed for {}", column),
                field: column,
            },
            (
                DatabaseErrorKind::UniqueViolation,
                Some(ConstraintName {
                    table,
                    kind: ConstraintKind::PrimaryKey | ConstraintKind::Unique,
                    ..
                }),
            ) => match ConstraintParser::extract_key_value_from_message(detail) {
                Some((field, value)) => AppError::Duplicate {
                    entity: table,
                    field,
                    value,
                },
                None => Self::generic(operation, "Unique constraint violation", message),
            },
            (DatabaseErrorKind::NotNullViolation, _) => {
                match ConstraintParser::extract_column_from_message(message) {
                    Some(field) => AppError::Validation {
                        reason: format!("Field is required for {}", Self::entity(message)),
                        field,
                    },
                    None => Self::generic(operation, "Not null constraint violation", message),
                }
            }
            (DatabaseErrorKind::SerializationFailure, _) => AppError::Conflict {
                message: "Concurrent update of the category tree, retry the request".to_string(),
            },
            (DatabaseErrorKind::ForeignKeyViolation, _) => {
                Self::generic(operation, "Foreign key constraint violation", message)
            }
            (DatabaseErrorKind::CheckViolation, _) => {
                Self::generic(operation, "Check constraint violation", message)
            }
            (DatabaseErrorKind::UniqueViolation, _) => {
                Self::generic(operation, "Unique constraint violation", message)
            }
            _ => Self::generic(operation, "Database error", message),
        }
    }

    fn entity(message: &str) -> String {
        ConstraintParser::extract_table_from_message(message)
            .unwrap_or_else(|| "resource".to_string())
    }

    fn generic(operation: &str, prefix: &str, message: &str) -> AppError {
        AppError::Database {
            operation: operation.to_string(),
            source: anyhow::Error::msg(format!("{}: {}", prefix, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    struct MockDatabaseErrorInfo {
        message: String,
        details: Option<String>,
        constraint_name: Option<String>,
    }

    impl MockDatabaseErrorInfo {
        fn new(message: &str, details: Option<&str>, constraint_name: Option<&str>) -> Box<Self> {
            Box::new(Self {
                message: message.to_string(),
                details: details.map(str::to_string),
                constraint_name: constraint_name.map(str::to_string),
            })
        }
    }

    impl DatabaseErrorInformation for MockDatabaseErrorInfo {
        fn message(&self) -> &str {
            &self.message
        }

        fn details(&self) -> Option<&str> {
            self.details.as_deref()
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            self.constraint_name.as_deref()
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn test_convert_not_found_error() {
        let result = DatabaseErrorConverter::convert_diesel_error(DieselError::NotFound, "find");
        assert!(matches!(result, AppError::NotFound { .. }));
    }

    #[test]
    fn test_missing_parent_becomes_hierarchy_error() {
        let info = MockDatabaseErrorInfo::new(
            "insert or update on table \"categories\" violates foreign key constraint \"categories_parent_id_fkey\"",
            Some("Key (parent_id)=(999) is not present in table \"categories\"."),
            Some("categories_parent_id_fkey"),
        );
        let error = DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info);

        match DatabaseErrorConverter::convert_diesel_error(error, "insert category") {
            AppError::Hierarchy(HierarchyError::ParentNotFound { index, parent_id }) => {
                assert_eq!(index, None);
                assert_eq!(parent_id, 999);
            }
            other => panic!("Expected ParentNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_blank_name_check_becomes_validation_error() {
        let info = MockDatabaseErrorInfo::new(
            "new row for relation \"categories\" violates check constraint \"categories_name_check\"",
            None,
            Some("categories_name_check"),
        );
        let error = DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info);

        match DatabaseErrorConverter::convert_diesel_error(error, "insert category") {
            AppError::Validation { field, .. } => assert_eq!(field, "name"),
            other => panic!("Expected Validation, got: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_closure_edge_becomes_duplicate() {
        let info = MockDatabaseErrorInfo::new(
            "duplicate key value violates unique constraint \"category_closure_pkey\"",
            Some("Key (ancestor_id, descendant_id)=(1, 2) already exists."),
            Some("category_closure_pkey"),
        );
        let error = DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info);

        match DatabaseErrorConverter::convert_diesel_error(error, "insert closure") {
            AppError::Duplicate {
                entity,
                field,
                value,
            } => {
                assert_eq!(entity, "category_closure");
                assert_eq!(field, "ancestor_id, descendant_id");
                assert_eq!(value, "1, 2");
            }
            other => panic!("Expected Duplicate, got: {:?}", other),
        }
    }

    #[test]
    fn test_not_null_violation() {
        let info = MockDatabaseErrorInfo::new(
            "null value in column \"name\" of relation \"categories\" violates not-null constraint",
            None,
            None,
        );
        let error = DieselError::DatabaseError(DatabaseErrorKind::NotNullViolation, info);

        match DatabaseErrorConverter::convert_diesel_error(error, "insert category") {
            AppError::Validation { field, reason } => {
                assert_eq!(field, "name");
                assert!(reason.contains("categories"));
            }
            other => panic!("Expected Validation, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_constraint_falls_back_to_database_error() {
        let info = MockDatabaseErrorInfo::new(
            "insert violates foreign key constraint \"orders_customer_fkey\"",
            None,
            Some("orders_customer_fkey"),
        );
        let error = DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info);

        match DatabaseErrorConverter::convert_diesel_error(error, "insert order") {
            AppError::Database { operation, source } => {
                assert_eq!(operation, "insert order");
                assert!(source.to_string().contains("Foreign key"));
            }
            other => panic!("Expected Database, got: {:?}", other),
        }
    }

    #[test]
    fn test_serialization_failure_becomes_conflict() {
        let info = MockDatabaseErrorInfo::new(
            "could not serialize access due to concurrent update",
            None,
            None,
        );
        let error = DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info);

        assert!(matches!(
            DatabaseErrorConverter::convert_diesel_error(error, "move subtree"),
            AppError::Conflict { .. }
        ));
    }

    #[test]
    fn test_other_diesel_errors_are_wrapped() {
        let result = DatabaseErrorConverter::convert_diesel_error(
            DieselError::RollbackTransaction,
            "update category",
        );
        match result {
            AppError::Database { operation, .. } => assert_eq!(operation, "update category"),
            other => panic!("Expected Database, got: {:?}", other),
        }
    }
}
