//! Feature registry errors
//!
//! Every failure the registry can report is a validation-style error raised
//! synchronously at the registry boundary. The feature manager is the only
//! layer that converts these into non-failing results.

use crate::core::error_handling::ContextualError;

/// Result type alias for registry operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// Definition is missing a required field or is otherwise malformed
    #[error("Invalid feature definition '{feature_id}': {reason}")]
    InvalidDefinition { feature_id: String, reason: String },

    /// Declared dependency has not been registered yet
    #[error("Feature {feature_id} depends on unregistered feature: {dependency_id}")]
    MissingDependency {
        feature_id: String,
        dependency_id: String,
    },

    /// Declared dependencies would close a loop in the feature graph
    #[error("Feature {feature_id} would create a dependency cycle: {}", .cycle.join(" -> "))]
    CyclicDependency {
        feature_id: String,
        cycle: Vec<String>,
    },

    #[error("Feature not found: {feature_id}")]
    FeatureNotFound { feature_id: String },

    #[error("Cannot enable {feature_id}, dependency {dependency_id} is not enabled")]
    DependencyNotEnabled {
        feature_id: String,
        dependency_id: String,
    },

    #[error("Cannot unregister feature {feature_id}, it has dependents: {}", .dependents.join(", "))]
    HasDependents {
        feature_id: String,
        dependents: Vec<String>,
    },
}

impl PluginError {
    /// The feature id the error is about
    pub fn feature_id(&self) -> &str {
        match self {
            PluginError::InvalidDefinition { feature_id, .. }
            | PluginError::MissingDependency { feature_id, .. }
            | PluginError::CyclicDependency { feature_id, .. }
            | PluginError::FeatureNotFound { feature_id }
            | PluginError::DependencyNotEnabled { feature_id, .. }
            | PluginError::HasDependents { feature_id, .. } => feature_id,
        }
    }
}

impl ContextualError for PluginError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}
