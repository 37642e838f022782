//! Builder error types
//!
//! Definition errors reject one query; they never affect the process or
//! other queries. Every code carries a non-zero numeric engine-style value.
//!
//! Error codes:
//! - QRY_TOO_FEW_KEY_VALUES (4801)
//! - QRY_TOO_MANY_KEY_VALUES (4802)
//! - QRY_MULTIPLE_PARENTS (4806)
//! - QRY_UNKNOWN_PARENT (4807)
//! - QRY_UNKNOWN_COLUMN (4808)
//! - QRY_WRONG_INDEX_TYPE (4810)
//! - QRY_DEFINITION_TOO_LARGE (4812)
//! - QRY_HAS_ZERO_OPERATIONS (4815)
//! - QRY_ILLEGAL_STATE (4817)
//! - QRY_WRONG_OPERATION_TYPE (4820)

use std::fmt;

/// Severity levels for builder errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query definition is rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Builder error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderErrorCode {
    /// Fewer key operands than the key has columns
    QryTooFewKeyValues,
    /// More key operands than the key has columns
    QryTooManyKeyValues,
    /// Linked operands reference more than one parent
    QryMultipleParents,
    /// Linked operand references an undefined operation
    QryUnknownParent,
    /// Linked operand names a column the parent does not produce
    QryUnknownColumn,
    /// Index kind cannot be compiled into an operation
    QryWrongIndexType,
    /// Too many levels in one tree
    QryDefinitionTooLarge,
    /// Prepare called on an empty builder
    QryHasZeroOperations,
    /// Tree shape or call order is invalid
    QryIllegalState,
    /// Scan requested below a lookup root
    QryWrongOperationType,
}

impl BuilderErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            BuilderErrorCode::QryTooFewKeyValues => "QRY_TOO_FEW_KEY_VALUES",
            BuilderErrorCode::QryTooManyKeyValues => "QRY_TOO_MANY_KEY_VALUES",
            BuilderErrorCode::QryMultipleParents => "QRY_MULTIPLE_PARENTS",
            BuilderErrorCode::QryUnknownParent => "QRY_UNKNOWN_PARENT",
            BuilderErrorCode::QryUnknownColumn => "QRY_UNKNOWN_COLUMN",
            BuilderErrorCode::QryWrongIndexType => "QRY_WRONG_INDEX_TYPE",
            BuilderErrorCode::QryDefinitionTooLarge => "QRY_DEFINITION_TOO_LARGE",
            BuilderErrorCode::QryHasZeroOperations => "QRY_HAS_ZERO_OPERATIONS",
            BuilderErrorCode::QryIllegalState => "QRY_ILLEGAL_STATE",
            BuilderErrorCode::QryWrongOperationType => "QRY_WRONG_OPERATION_TYPE",
        }
    }

    /// Returns the numeric engine-style code (never zero)
    pub fn number(&self) -> i32 {
        match self {
            BuilderErrorCode::QryTooFewKeyValues => 4801,
            BuilderErrorCode::QryTooManyKeyValues => 4802,
            BuilderErrorCode::QryMultipleParents => 4806,
            BuilderErrorCode::QryUnknownParent => 4807,
            BuilderErrorCode::QryUnknownColumn => 4808,
            BuilderErrorCode::QryWrongIndexType => 4810,
            BuilderErrorCode::QryDefinitionTooLarge => 4812,
            BuilderErrorCode::QryHasZeroOperations => 4815,
            BuilderErrorCode::QryIllegalState => 4817,
            BuilderErrorCode::QryWrongOperationType => 4820,
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for BuilderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Builder error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderError {
    code: BuilderErrorCode,
    message: String,
    /// Tree level the failing definition would have occupied
    level: Option<usize>,
}

impl BuilderError {
    pub fn too_few_key_values(target: &str, expected: usize, got: usize) -> Self {
        Self {
            code: BuilderErrorCode::QryTooFewKeyValues,
            message: format!("'{}' needs {} key values, got {}", target, expected, got),
            level: None,
        }
    }

    pub fn too_many_key_values(target: &str, expected: usize, got: usize) -> Self {
        Self {
            code: BuilderErrorCode::QryTooManyKeyValues,
            message: format!("'{}' takes {} key values, got {}", target, expected, got),
            level: None,
        }
    }

    pub fn multiple_parents() -> Self {
        Self {
            code: BuilderErrorCode::QryMultipleParents,
            message: "Linked operands reference more than one parent operation".into(),
            level: None,
        }
    }

    pub fn unknown_parent(handle: usize) -> Self {
        Self {
            code: BuilderErrorCode::QryUnknownParent,
            message: format!("Operation {} has not been defined", handle),
            level: None,
        }
    }

    pub fn unknown_column(column: &str, table: &str) -> Self {
        Self {
            code: BuilderErrorCode::QryUnknownColumn,
            message: format!("Parent table '{}' has no column '{}'", table, column),
            level: None,
        }
    }

    pub fn wrong_index_type(index: &str, kind: impl fmt::Display) -> Self {
        Self {
            code: BuilderErrorCode::QryWrongIndexType,
            message: format!("Index '{}' of kind {} cannot be used in a query", index, kind),
            level: None,
        }
    }

    pub fn definition_too_large(max: usize) -> Self {
        Self {
            code: BuilderErrorCode::QryDefinitionTooLarge,
            message: format!("Query trees are limited to {} levels", max),
            level: None,
        }
    }

    pub fn zero_operations() -> Self {
        Self {
            code: BuilderErrorCode::QryHasZeroOperations,
            message: "No operations defined".into(),
            level: None,
        }
    }

    pub fn illegal_state(reason: impl Into<String>) -> Self {
        Self {
            code: BuilderErrorCode::QryIllegalState,
            message: reason.into(),
            level: None,
        }
    }

    pub fn wrong_operation_type(reason: impl Into<String>) -> Self {
        Self {
            code: BuilderErrorCode::QryWrongOperationType,
            message: reason.into(),
            level: None,
        }
    }

    /// Attach the level the failed definition belongs to
    pub fn at_level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    pub fn code(&self) -> BuilderErrorCode {
        self.code
    }

    /// Numeric code, never zero
    pub fn number(&self) -> i32 {
        self.code.number()
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> Option<usize> {
        self.level
    }
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.code.severity(),
            self.code.code(),
            self.code.number(),
            self.message
        )?;
        if let Some(level) = self.level {
            write!(f, " [level {}]", level)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuilderError {}

/// Result type for builder operations
pub type BuilderResult<T> = Result<T, BuilderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BuilderErrorCode::QryWrongIndexType.code(),
            "QRY_WRONG_INDEX_TYPE"
        );
        assert_eq!(
            BuilderErrorCode::QryWrongOperationType.code(),
            "QRY_WRONG_OPERATION_TYPE"
        );
    }

    #[test]
    fn test_numbers_are_non_zero_and_distinct() {
        let all = [
            BuilderErrorCode::QryTooFewKeyValues,
            BuilderErrorCode::QryTooManyKeyValues,
            BuilderErrorCode::QryMultipleParents,
            BuilderErrorCode::QryUnknownParent,
            BuilderErrorCode::QryUnknownColumn,
            BuilderErrorCode::QryWrongIndexType,
            BuilderErrorCode::QryDefinitionTooLarge,
            BuilderErrorCode::QryHasZeroOperations,
            BuilderErrorCode::QryIllegalState,
            BuilderErrorCode::QryWrongOperationType,
        ];
        for (i, a) in all.iter().enumerate() {
            assert_ne!(a.number(), 0);
            for b in &all[i + 1..] {
                assert_ne!(a.number(), b.number());
            }
        }
    }

    #[test]
    fn test_error_display() {
        let err = BuilderError::unknown_column("customer_id", "customer").at_level(1);
        let display = err.to_string();
        assert!(display.contains("REJECT"));
        assert!(display.contains("QRY_UNKNOWN_COLUMN"));
        assert!(display.contains("4808"));
        assert!(display.contains("customer_id"));
        assert!(display.contains("[level 1]"));
    }
}
