//! Public API for external dependency resolution

pub use crate::dependency::error::{DependencyError, DependencyResult};
pub use crate::dependency::manager::DependencyManager;
pub use crate::dependency::types::{
    CheckFn, DependencyManagerConfig, DependencyResolution, FailureStrategy, FallbackFn,
    FeatureDependency, ProbeError, ValidationReport,
};
