//! Query error types
//!
//! Syntax errors come from parsing and carry the character position where the
//! problem was found. The remaining kinds come from resolving a query against
//! the available event types.

use thiserror::Error;

/// Errors that can occur while parsing or resolving a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Query text violates the grammar
    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// Referenced event type does not exist
    #[error("Unknown event type: '{name}'{}", did_you_mean(suggestion))]
    UnknownType {
        name: String,
        suggestion: Option<String>,
    },

    /// Referenced field does not exist in any source type
    #[error("Unknown field: '{name}'{}", did_you_mean(suggestion))]
    UnknownField {
        name: String,
        suggestion: Option<String>,
    },

    /// Query is well formed but cannot be executed as written
    #[error("Invalid query: {0}")]
    Validation(String),
}

impl QueryError {
    /// Create a syntax error at a character position
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        QueryError::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation(message.into())
    }

    /// Character position of a syntax error
    pub fn position(&self) -> Option<usize> {
        match self {
            QueryError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::syntax("expected FROM", 14);
        assert_eq!(err.to_string(), "Syntax error at position 14: expected FROM");
        assert_eq!(err.position(), Some(14));

        let err = QueryError::UnknownField {
            name: "stratTime".to_string(),
            suggestion: Some("startTime".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unknown field: 'stratTime'. Did you mean 'startTime'?"
        );
        assert_eq!(err.position(), None);

        let err = QueryError::UnknownType {
            name: "Nothing".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Unknown event type: 'Nothing'");
    }
}
