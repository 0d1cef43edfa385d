use std::fmt;

use crate::api::{ApiError, ResourceKind};
use crate::document::SchemaError;

/// Error taxonomy of the import engine.
///
/// Only `Schema` aborts a run before a report is produced; every other
/// variant is captured per-entry and surfaced in the final report.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed or structurally invalid document
    Schema(SchemaError),

    /// A name inside one entry resolves to nothing; fails that entry only
    UnresolvedReference {
        kind: ResourceKind,
        name: String,
    },

    /// Same-type, same-name resource already exists under fail-on-conflict
    Conflict,

    /// Transport or HTTP failure from the management API
    Api(ApiError),

    /// The API rejected a well-formed, resolved payload
    Validation(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Schema(err) => write!(f, "{}", err),
            EngineError::UnresolvedReference { name, .. } => {
                write!(f, "unresolved reference: {}", name)
            }
            EngineError::Conflict => write!(f, "already exists"),
            EngineError::Api(err) => write!(f, "{}", err),
            EngineError::Validation(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Schema(err) => Some(err),
            EngineError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        EngineError::Schema(err)
    }
}

impl From<ApiError> for EngineError {
    fn from(err: ApiError) -> Self {
        // 422 means the payload was understood and refused; surface the
        // API's own message verbatim
        if err.status == Some(422) {
            EngineError::Validation(err.message)
        } else {
            EngineError::Api(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_reference_names_the_reference() {
        let err = EngineError::UnresolvedReference {
            kind: ResourceKind::Group,
            name: "developers".to_string(),
        };
        assert_eq!(err.to_string(), "unresolved reference: developers");
    }

    #[test]
    fn validation_errors_surface_verbatim() {
        let err = EngineError::from(ApiError::new(Some(422), "network range overlaps"));
        assert_eq!(err.to_string(), "network range overlaps");

        let err = EngineError::from(ApiError::new(Some(500), "boom"));
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }
}
