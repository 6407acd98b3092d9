//! Plugin Test Utilities
//!
//! Shared feature fixtures and manager builders for the plugin test suites.

use crate::core::mode::RuntimeMode;
use crate::plugin::manager::{FeatureManager, FeatureManagerConfig};
use crate::plugin::registry::{FeatureRegistry, SharedFeatureRegistry};
use crate::plugin::types::{FeatureDefinition, ManagerState};
use std::sync::{Arc, Mutex};

/// Stand-in for a rendered feature component
#[derive(Debug, PartialEq)]
pub struct MockComponent {
    pub label: String,
}

/// Disabled feature with a mock component and the given dependencies
pub fn mock_feature(id: &str, dependencies: &[&str]) -> FeatureDefinition {
    FeatureDefinition::new(id, format!("{} feature", id), "1.0.0")
        .with_component(MockComponent {
            label: id.to_string(),
        })
        .with_dependencies(dependencies.iter().copied())
}

pub fn test_manager() -> FeatureManager {
    FeatureManager::new(
        SharedFeatureRegistry::new(FeatureRegistry::with_mode(RuntimeMode::Test)),
        FeatureManagerConfig::default(),
        RuntimeMode::Test,
    )
}

/// Listener that records every state it is given
pub fn recording_listener() -> (
    Arc<Mutex<Vec<ManagerState>>>,
    impl Fn(&ManagerState) + Send + Sync + 'static,
) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    (states, move |state: &ManagerState| {
        sink.lock().unwrap().push(state.clone())
    })
}

/// Ids of currently enabled features according to the manager
pub fn enabled_ids(manager: &FeatureManager) -> Vec<String> {
    manager
        .get_all_plugin_statuses()
        .into_iter()
        .filter(|status| status.is_ready())
        .map(|status| status.id)
        .collect()
}
