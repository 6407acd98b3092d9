//! Public API for the feature plugin system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Registry and its shared wrapper
pub use crate::plugin::registry::{FeatureRegistry, SharedFeatureRegistry};

// Dependency graph
pub use crate::plugin::graph::FeatureGraph;

// Management facade
pub use crate::plugin::manager::{
    FeatureManager, FeatureManagerConfig, StateListener, Subscription, DEFAULT_REFRESH_INTERVAL,
};

// Error handling
pub use crate::plugin::error::{PluginError, PluginResult};

// Feature definitions and status snapshots
pub use crate::plugin::types::{
    DisableReason, FeatureComponent, FeatureDefinition, FeatureRuntimeError, FeatureSnapshot,
    FeatureSummary, HealthReport, HealthSummary, ManagerState, PluginStatus, RegistryState,
};
