//! Feature definitions and the status snapshots derived from them

use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Opaque handle to whatever renders or implements a feature.
///
/// The registry stores and returns it but never looks inside; consumers that
/// know the concrete type can downcast.
#[derive(Clone)]
pub struct FeatureComponent(Arc<dyn Any + Send + Sync>);

impl FeatureComponent {
    pub fn new<T: Any + Send + Sync>(component: T) -> Self {
        Self(Arc::new(component))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// True if both handles point at the same component
    pub fn same_as(&self, other: &FeatureComponent) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FeatureComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FeatureComponent(..)")
    }
}

/// A registrable optional feature
#[derive(Debug, Clone)]
pub struct FeatureDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    /// Free-form feature configuration, carried through untouched
    pub config: serde_json::Map<String, serde_json::Value>,
    pub enabled: bool,
    /// Ids of features that must be registered (and enabled) first
    pub dependencies: Vec<String>,
    pub component: Option<FeatureComponent>,
}

impl FeatureDefinition {
    /// A disabled definition with no dependencies and no component yet
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            config: serde_json::Map::new(),
            enabled: false,
            dependencies: Vec::new(),
            component: None,
        }
    }

    pub fn with_component<T: Any + Send + Sync>(mut self, component: T) -> Self {
        self.component = Some(FeatureComponent::new(component));
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Runtime failure reported by a running feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRuntimeError {
    pub feature_id: String,
    pub message: String,
    /// Lifecycle phase the error occurred in, if known (e.g. "mount")
    pub phase: Option<String>,
    /// Recoverable errors are logged; anything else disables the feature
    pub recoverable: bool,
}

impl FeatureRuntimeError {
    pub fn recoverable(feature_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            message: message.into(),
            phase: None,
            recoverable: true,
        }
    }

    pub fn fatal(feature_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            message: message.into(),
            phase: None,
            recoverable: false,
        }
    }

    pub fn in_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

impl fmt::Display for FeatureRuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.phase {
            Some(phase) => write!(f, "[{}] {} ({})", self.feature_id, self.message, phase),
            None => write!(f, "[{}] {}", self.feature_id, self.message),
        }
    }
}

/// Why a registered feature is currently disabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableReason {
    /// Registered disabled and never enabled since
    NotEnabled,
    /// Explicit `disable_feature` call
    Requested,
    /// Disabled because a feature it depends on was disabled
    Cascade { cause: String },
    /// Force-disabled by a non-recoverable runtime error
    RuntimeError { message: String },
}

impl DisableReason {
    /// Only runtime failures count against system health
    pub fn is_unexpected(&self) -> bool {
        matches!(self, DisableReason::RuntimeError { .. })
    }
}

/// Registry entry as seen from outside: definition plus bookkeeping
#[derive(Debug, Clone)]
pub struct FeatureSnapshot {
    pub definition: FeatureDefinition,
    pub registered_at: SystemTime,
    pub disable_reason: Option<DisableReason>,
}

/// Per-plugin status maintained by the feature manager
#[derive(Debug, Clone, PartialEq)]
pub struct PluginStatus {
    pub id: String,
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub registered: bool,
    pub last_error: Option<String>,
    pub registration_time: Option<SystemTime>,
    pub disable_reason: Option<DisableReason>,
}

impl PluginStatus {
    pub fn is_ready(&self) -> bool {
        self.registered && self.enabled
    }

    pub fn is_unexpectedly_disabled(&self) -> bool {
        self.registered
            && !self.enabled
            && self
                .disable_reason
                .as_ref()
                .is_some_and(DisableReason::is_unexpected)
    }
}

/// Snapshot published to manager subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerState {
    pub plugins: BTreeMap<String, PluginStatus>,
    pub total_plugins: usize,
    pub enabled_plugins: usize,
    pub last_update: SystemTime,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self {
            plugins: BTreeMap::new(),
            total_plugins: 0,
            enabled_plugins: 0,
            last_update: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthSummary {
    pub total_plugins: usize,
    pub enabled_plugins: usize,
    pub disabled_plugins: usize,
    pub errored_plugins: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub summary: HealthSummary,
    pub details: Vec<PluginStatus>,
}

/// Debug view of the registry contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryState {
    pub total_features: usize,
    pub enabled_features: usize,
    pub features: BTreeMap<String, FeatureSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSummary {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub dependencies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct MapLayer(&'static str);

    #[test]
    fn test_component_handle_is_opaque_but_downcastable() {
        let definition = FeatureDefinition::new("map", "Map", "1.0.0").with_component(MapLayer("base"));
        let component = definition.component.clone().expect("component set");

        assert_eq!(component.downcast_ref::<MapLayer>(), Some(&MapLayer("base")));
        assert!(component.downcast_ref::<String>().is_none());
        assert!(component.same_as(definition.component.as_ref().unwrap()));
        assert_eq!(format!("{:?}", component), "FeatureComponent(..)");
    }

    #[test]
    fn test_builder_collects_dependencies_and_config() {
        let definition = FeatureDefinition::new("overlay", "Overlay", "2.1.0")
            .with_dependencies(["map", "legend"])
            .with_description("Redundancy overlay")
            .with_config("opacity", serde_json::json!(0.8))
            .enabled(true);

        assert_eq!(definition.dependencies, vec!["map", "legend"]);
        assert_eq!(definition.config["opacity"], serde_json::json!(0.8));
        assert!(definition.enabled);
        assert!(definition.component.is_none());
    }

    #[test]
    fn test_runtime_error_display() {
        let err = FeatureRuntimeError::fatal("overlay", "render loop crashed").in_phase("mount");
        assert!(!err.recoverable);
        assert_eq!(err.to_string(), "[overlay] render loop crashed (mount)");
        assert!(FeatureRuntimeError::recoverable("overlay", "slow frame").recoverable);
    }

    #[test]
    fn test_only_runtime_errors_are_unexpected() {
        let mut status = PluginStatus {
            id: "a".into(),
            name: "A".into(),
            version: "1".into(),
            enabled: false,
            registered: true,
            last_error: None,
            registration_time: None,
            disable_reason: Some(DisableReason::Requested),
        };
        assert!(!status.is_unexpectedly_disabled());

        status.disable_reason = Some(DisableReason::RuntimeError {
            message: "boom".into(),
        });
        assert!(status.is_unexpectedly_disabled());
        assert!(!status.is_ready());
    }
}
