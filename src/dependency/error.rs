//! Dependency resolution errors

use crate::core::error_handling::ContextualError;

pub type DependencyResult<T> = std::result::Result<T, DependencyError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// A required dependency stayed unresolved under the `fail` strategy
    #[error("Required dependency failed: {id}")]
    RequiredDependencyFailed { id: String },

    /// A single check attempt outlived the configured timeout
    #[error("Dependency resolution timeout")]
    Timeout,

    /// The check itself reported an error
    #[error("{message}")]
    CheckFailed { id: String, message: String },

    #[error("Fallback failed for {id}: {message}")]
    FallbackFailed { id: String, message: String },
}

impl ContextualError for DependencyError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, DependencyError::RequiredDependencyFailed { .. })
    }

    fn user_message(&self) -> Option<String> {
        match self {
            DependencyError::RequiredDependencyFailed { id } => Some(format!(
                "Required dependency '{}' could not be resolved; check that it is available or relax [dependencies] failure_strategy",
                id
            )),
            _ => None,
        }
    }
}
