//! Feature Registry
//!
//! Source of truth for registered features, their enable state and the
//! integrity of feature-to-feature dependencies. All mutation goes through
//! the methods here; the feature manager holds a [`SharedFeatureRegistry`]
//! and proxies its writes back through it.

use crate::core::mode::RuntimeMode;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::graph::FeatureGraph;
use crate::plugin::types::{
    DisableReason, FeatureDefinition, FeatureRuntimeError, FeatureSnapshot, FeatureSummary,
    RegistryState,
};
use crate::{dev_log, dev_warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

struct RegisteredFeature {
    definition: FeatureDefinition,
    registered_at: SystemTime,
    disable_reason: Option<DisableReason>,
}

impl RegisteredFeature {
    fn snapshot(&self) -> FeatureSnapshot {
        FeatureSnapshot {
            definition: self.definition.clone(),
            registered_at: self.registered_at,
            disable_reason: self.disable_reason.clone(),
        }
    }
}

/// Registry of features keyed by id
pub struct FeatureRegistry {
    features: HashMap<String, RegisteredFeature>,
    graph: FeatureGraph,
    mode: RuntimeMode,
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.sorted_ids())
            .field("enabled", &self.enabled_ids())
            .field("mode", &self.mode)
            .finish()
    }
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::with_mode(RuntimeMode::default())
    }

    pub fn with_mode(mode: RuntimeMode) -> Self {
        dev_log!(mode, "[FeatureRegistry] Initialized");
        Self {
            features: HashMap::new(),
            graph: FeatureGraph::new(),
            mode,
        }
    }

    /// Register a feature, or replace an existing one with the same id
    pub fn register(&mut self, mut feature: FeatureDefinition) -> PluginResult<()> {
        Self::validate_definition(&feature)?;

        let mut seen = HashSet::new();
        feature
            .dependencies
            .retain(|dependency| seen.insert(dependency.clone()));

        for dependency_id in &feature.dependencies {
            if dependency_id != &feature.id && !self.features.contains_key(dependency_id) {
                return Err(PluginError::MissingDependency {
                    feature_id: feature.id.clone(),
                    dependency_id: dependency_id.clone(),
                });
            }
        }

        if let Some(cycle) = self.graph.find_cycle(&feature.id, &feature.dependencies) {
            return Err(PluginError::CyclicDependency {
                feature_id: feature.id.clone(),
                cycle,
            });
        }

        if feature.enabled {
            self.check_dependencies_enabled(&feature.id, &feature.dependencies)?;
        }

        let existing = self
            .features
            .get(&feature.id)
            .map(|f| (f.registered_at, f.definition.enabled));
        let registered_at = match existing {
            Some((registered_at, was_enabled)) => {
                dev_warn!(
                    self.mode,
                    "[FeatureRegistry] Feature {} already registered, updating...",
                    feature.id
                );
                // A replacement that arrives disabled must not leave enabled
                // dependents behind
                if was_enabled && !feature.enabled {
                    self.cascade_disable(&feature.id);
                }
                registered_at
            }
            None => SystemTime::now(),
        };

        dev_log!(
            self.mode,
            "[FeatureRegistry] Registered feature: {} v{}",
            feature.id,
            feature.version
        );

        let disable_reason = (!feature.enabled).then_some(DisableReason::NotEnabled);
        self.graph.insert(&feature.id, &feature.dependencies);
        self.features.insert(
            feature.id.clone(),
            RegisteredFeature {
                definition: feature,
                registered_at,
                disable_reason,
            },
        );
        Ok(())
    }

    /// Remove a feature. Unknown ids are ignored with a warning.
    pub fn unregister(&mut self, feature_id: &str) -> PluginResult<()> {
        if !self.features.contains_key(feature_id) {
            log::warn!(
                "[FeatureRegistry] Attempted to unregister non-existent feature: {}",
                feature_id
            );
            return Ok(());
        }

        let dependents = self.get_dependents(feature_id);
        if !dependents.is_empty() {
            return Err(PluginError::HasDependents {
                feature_id: feature_id.to_string(),
                dependents,
            });
        }

        self.features.remove(feature_id);
        self.graph.remove(feature_id);
        dev_log!(self.mode, "[FeatureRegistry] Unregistered feature: {}", feature_id);
        Ok(())
    }

    pub fn enable_feature(&mut self, feature_id: &str) -> PluginResult<()> {
        let dependencies = self
            .features
            .get(feature_id)
            .map(|f| f.definition.dependencies.clone())
            .ok_or_else(|| PluginError::FeatureNotFound {
                feature_id: feature_id.to_string(),
            })?;

        self.check_dependencies_enabled(feature_id, &dependencies)?;

        if let Some(feature) = self.features.get_mut(feature_id) {
            feature.definition.enabled = true;
            feature.disable_reason = None;
        }
        dev_log!(self.mode, "[FeatureRegistry] Enabled feature: {}", feature_id);
        Ok(())
    }

    /// Disable a feature after disabling everything that depends on it
    pub fn disable_feature(&mut self, feature_id: &str) -> PluginResult<()> {
        if !self.features.contains_key(feature_id) {
            return Err(PluginError::FeatureNotFound {
                feature_id: feature_id.to_string(),
            });
        }

        self.cascade_disable(feature_id);
        self.set_disabled(feature_id, DisableReason::Requested);
        dev_log!(self.mode, "[FeatureRegistry] Disabled feature: {}", feature_id);
        Ok(())
    }

    /// Route a runtime error reported by a feature.
    ///
    /// Non-recoverable errors switch the feature off directly, without the
    /// dependent cascade: the feature has already failed. Returns true if the
    /// feature was disabled as a result.
    pub fn handle_runtime_error(&mut self, error: &FeatureRuntimeError) -> bool {
        log::error!(
            "[FeatureRegistry] Error in feature {}: {}",
            error.feature_id,
            error
        );

        if error.recoverable {
            return false;
        }

        match self.features.get_mut(&error.feature_id) {
            Some(feature) => {
                feature.definition.enabled = false;
                feature.disable_reason = Some(DisableReason::RuntimeError {
                    message: error.message.clone(),
                });
                log::warn!(
                    "[FeatureRegistry] Disabled feature {} due to critical error",
                    error.feature_id
                );
                true
            }
            None => {
                log::warn!(
                    "[FeatureRegistry] Runtime error for unknown feature {} ignored",
                    error.feature_id
                );
                false
            }
        }
    }

    pub fn is_registered(&self, feature_id: &str) -> bool {
        self.features.contains_key(feature_id)
    }

    pub fn get_feature(&self, feature_id: &str) -> Option<&FeatureDefinition> {
        self.features.get(feature_id).map(|f| &f.definition)
    }

    /// All features, sorted by id
    pub fn get_all_features(&self) -> Vec<&FeatureDefinition> {
        let mut all: Vec<&FeatureDefinition> =
            self.features.values().map(|f| &f.definition).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn get_enabled_features(&self) -> Vec<&FeatureDefinition> {
        self.get_all_features()
            .into_iter()
            .filter(|f| f.enabled)
            .collect()
    }

    /// Direct dependents of a feature, sorted by id
    pub fn get_dependents(&self, feature_id: &str) -> Vec<String> {
        self.graph.dependents_of(feature_id)
    }

    pub fn disable_reason(&self, feature_id: &str) -> Option<&DisableReason> {
        self.features
            .get(feature_id)
            .and_then(|f| f.disable_reason.as_ref())
    }

    pub fn registration_time(&self, feature_id: &str) -> Option<SystemTime> {
        self.features.get(feature_id).map(|f| f.registered_at)
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn snapshot(&self) -> Vec<FeatureSnapshot> {
        let mut snapshots: Vec<FeatureSnapshot> =
            self.features.values().map(RegisteredFeature::snapshot).collect();
        snapshots.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        snapshots
    }

    /// Debugging view of the registry contents
    pub fn registry_state(&self) -> RegistryState {
        let features: BTreeMap<String, FeatureSummary> = self
            .features
            .iter()
            .map(|(id, f)| {
                (
                    id.clone(),
                    FeatureSummary {
                        name: f.definition.name.clone(),
                        version: f.definition.version.clone(),
                        enabled: f.definition.enabled,
                        dependencies: f.definition.dependencies.clone(),
                    },
                )
            })
            .collect();

        RegistryState {
            total_features: self.features.len(),
            enabled_features: features.values().filter(|f| f.enabled).count(),
            features,
        }
    }

    /// Drop every feature. Intended for tests.
    pub fn clear(&mut self) {
        if !self.mode.is_test() {
            log::warn!("[FeatureRegistry] clear() should only be used in tests");
        }
        self.features.clear();
        self.graph.clear();
    }

    fn validate_definition(feature: &FeatureDefinition) -> PluginResult<()> {
        let invalid = |reason: &str| PluginError::InvalidDefinition {
            feature_id: feature.id.clone(),
            reason: reason.to_string(),
        };

        if feature.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if feature.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if feature.version.trim().is_empty() {
            return Err(invalid("version must not be empty"));
        }
        if feature.component.is_none() {
            return Err(invalid("component handle is missing"));
        }

        if feature.dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err(invalid("dependency ids must not be empty"));
        }
        Ok(())
    }

    fn check_dependencies_enabled(
        &self,
        feature_id: &str,
        dependencies: &[String],
    ) -> PluginResult<()> {
        for dependency_id in dependencies {
            let enabled = self
                .features
                .get(dependency_id)
                .is_some_and(|d| d.definition.enabled);
            if !enabled {
                return Err(PluginError::DependencyNotEnabled {
                    feature_id: feature_id.to_string(),
                    dependency_id: dependency_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn cascade_disable(&mut self, feature_id: &str) {
        for dependent in self.graph.cascade_order(feature_id) {
            let was_enabled = self
                .features
                .get(&dependent)
                .is_some_and(|f| f.definition.enabled);
            if was_enabled {
                self.set_disabled(
                    &dependent,
                    DisableReason::Cascade {
                        cause: feature_id.to_string(),
                    },
                );
                dev_log!(
                    self.mode,
                    "[FeatureRegistry] Disabled feature: {} (depends on {})",
                    dependent,
                    feature_id
                );
            }
        }
    }

    fn set_disabled(&mut self, feature_id: &str, reason: DisableReason) {
        if let Some(feature) = self.features.get_mut(feature_id) {
            feature.definition.enabled = false;
            feature.disable_reason = Some(reason);
        }
    }

    fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.features.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn enabled_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .features
            .iter()
            .filter(|(_, f)| f.definition.enabled)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe shared feature registry
#[derive(Debug, Clone)]
pub struct SharedFeatureRegistry {
    inner: Arc<RwLock<FeatureRegistry>>,
}

impl SharedFeatureRegistry {
    pub fn new(registry: FeatureRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Direct access for multi-step operations under one lock
    pub fn inner(&self) -> &Arc<RwLock<FeatureRegistry>> {
        &self.inner
    }

    pub async fn register(&self, feature: FeatureDefinition) -> PluginResult<()> {
        self.inner.write().await.register(feature)
    }

    pub async fn unregister(&self, feature_id: &str) -> PluginResult<()> {
        self.inner.write().await.unregister(feature_id)
    }

    pub async fn enable_feature(&self, feature_id: &str) -> PluginResult<()> {
        self.inner.write().await.enable_feature(feature_id)
    }

    pub async fn disable_feature(&self, feature_id: &str) -> PluginResult<()> {
        self.inner.write().await.disable_feature(feature_id)
    }

    pub async fn handle_runtime_error(&self, error: &FeatureRuntimeError) -> bool {
        self.inner.write().await.handle_runtime_error(error)
    }

    pub async fn is_registered(&self, feature_id: &str) -> bool {
        self.inner.read().await.is_registered(feature_id)
    }

    pub async fn get_feature(&self, feature_id: &str) -> Option<FeatureDefinition> {
        self.inner.read().await.get_feature(feature_id).cloned()
    }

    pub async fn get_all_features(&self) -> Vec<FeatureDefinition> {
        let registry = self.inner.read().await;
        registry.get_all_features().into_iter().cloned().collect()
    }

    pub async fn get_enabled_features(&self) -> Vec<FeatureDefinition> {
        let registry = self.inner.read().await;
        registry.get_enabled_features().into_iter().cloned().collect()
    }

    pub async fn snapshot(&self) -> Vec<FeatureSnapshot> {
        self.inner.read().await.snapshot()
    }

    pub async fn registry_state(&self) -> RegistryState {
        self.inner.read().await.registry_state()
    }
}

impl Default for SharedFeatureRegistry {
    fn default() -> Self {
        Self::new(FeatureRegistry::default())
    }
}
