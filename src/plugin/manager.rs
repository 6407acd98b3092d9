//! Feature Manager
//!
//! Non-failing facade over the feature registry. Every mutating call reports
//! success as a bool and records failures in the affected plugin's status,
//! so dashboards and feature modules never have to handle registry errors.
//! The manager keeps a periodically refreshed [`ManagerState`] snapshot and
//! pushes it to subscribed listeners.

use crate::core::mode::RuntimeMode;
use crate::core::sync::{call_isolated, lock_recover};
use crate::core::task::ScopedTask;
use crate::dev_log;
use crate::plugin::error::PluginResult;
use crate::plugin::registry::SharedFeatureRegistry;
use crate::plugin::types::{
    FeatureDefinition, FeatureRuntimeError, HealthReport, HealthSummary, ManagerState,
    PluginStatus,
};
use prettytable::{format, row, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime};

/// Default interval between status refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureManagerConfig {
    #[serde(rename = "refresh_interval_ms", with = "crate::core::config::duration_ms")]
    pub refresh_interval: Duration,
}

impl Default for FeatureManagerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Callback invoked with every new manager state
pub type StateListener = Arc<dyn Fn(&ManagerState) + Send + Sync>;

/// Last failure recorded against a plugin id
#[derive(Debug, Clone)]
struct ErrorRecord {
    message: String,
    /// Status to publish when the id is not (or no longer) registered
    pending: Option<PluginStatus>,
}

struct ManagerInner {
    registry: SharedFeatureRegistry,
    mode: RuntimeMode,
    state: Mutex<ManagerState>,
    errors: Mutex<HashMap<String, ErrorRecord>>,
    listeners: Mutex<Vec<(u64, StateListener)>>,
    next_listener_id: AtomicU64,
}

impl ManagerInner {
    /// Rebuild the state snapshot from the registry and notify listeners
    async fn refresh(&self) {
        let snapshots = self.registry.snapshot().await;
        let errors = {
            let mut errors = lock_recover(&self.errors, "feature manager errors");
            // Only failed registrations are reported for ids the registry doesn't hold
            errors.retain(|id, record| {
                record.pending.is_some() || snapshots.iter().any(|s| &s.definition.id == id)
            });
            errors.clone()
        };

        let mut plugins: BTreeMap<String, PluginStatus> = snapshots
            .into_iter()
            .map(|snapshot| {
                let id = snapshot.definition.id.clone();
                let status = PluginStatus {
                    last_error: errors.get(&id).map(|e| e.message.clone()),
                    id: id.clone(),
                    name: snapshot.definition.name,
                    version: snapshot.definition.version,
                    enabled: snapshot.definition.enabled,
                    registered: true,
                    registration_time: Some(snapshot.registered_at),
                    disable_reason: snapshot.disable_reason,
                };
                (id, status)
            })
            .collect();

        for (id, record) in errors {
            if plugins.contains_key(&id) {
                continue;
            }
            if let Some(mut status) = record.pending {
                status.last_error = Some(record.message);
                plugins.insert(id, status);
            }
        }

        let state = ManagerState {
            total_plugins: plugins.values().filter(|p| p.registered).count(),
            enabled_plugins: plugins.values().filter(|p| p.is_ready()).count(),
            plugins,
            last_update: SystemTime::now(),
        };

        *lock_recover(&self.state, "feature manager state") = state.clone();
        self.notify(&state);
    }

    fn notify(&self, state: &ManagerState) {
        // Listeners run without any manager lock held, so they may call back in
        let listeners: Vec<StateListener> = lock_recover(&self.listeners, "feature manager listeners")
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            call_isolated("feature manager listener", || listener(state));
        }
    }

    fn record_error(&self, feature_id: &str, message: String, pending: Option<PluginStatus>) {
        let mut errors = lock_recover(&self.errors, "feature manager errors");
        let pending = pending.or_else(|| errors.get(feature_id).and_then(|e| e.pending.clone()));
        errors.insert(feature_id.to_string(), ErrorRecord { message, pending });
    }

    fn clear_error(&self, feature_id: &str) {
        lock_recover(&self.errors, "feature manager errors").remove(feature_id);
    }

    /// Convert a registry result into the facade's bool, recording the outcome
    async fn settle(
        &self,
        operation: &str,
        feature_id: &str,
        result: PluginResult<()>,
        pending: Option<PluginStatus>,
    ) -> bool {
        let succeeded = match result {
            Ok(()) => {
                self.clear_error(feature_id);
                dev_log!(
                    self.mode,
                    "[FeatureManager] {} succeeded for plugin: {}",
                    operation,
                    feature_id
                );
                true
            }
            Err(err) => {
                log::error!(
                    "[FeatureManager] Failed to {} plugin {}: {}",
                    operation,
                    feature_id,
                    err
                );
                self.record_error(feature_id, err.to_string(), pending);
                false
            }
        };
        self.refresh().await;
        succeeded
    }
}

/// Handle returned by [`FeatureManager::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    manager: Weak<ManagerInner>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.manager.upgrade() else {
            return false;
        };
        let mut listeners = lock_recover(&inner.listeners, "feature manager listeners");
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}

impl std::fmt::Debug for ManagerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerInner")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

pub struct FeatureManager {
    inner: Arc<ManagerInner>,
    config: FeatureManagerConfig,
    refresh_task: ScopedTask,
}

impl FeatureManager {
    pub fn new(registry: SharedFeatureRegistry, config: FeatureManagerConfig, mode: RuntimeMode) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                mode,
                state: Mutex::new(ManagerState::default()),
                errors: Mutex::new(HashMap::new()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
            }),
            config,
            refresh_task: ScopedTask::idle("feature-manager-refresh"),
        }
    }

    pub fn registry(&self) -> &SharedFeatureRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &FeatureManagerConfig {
        &self.config
    }

    /// Take an initial snapshot and start the periodic refresh
    pub async fn start(&mut self) {
        self.inner.refresh().await;

        let weak = Arc::downgrade(&self.inner);
        self.refresh_task
            .start_interval(self.config.refresh_interval, move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.refresh().await;
                    }
                }
            });
        dev_log!(
            self.inner.mode,
            "[FeatureManager] Refreshing every {:?}",
            self.config.refresh_interval
        );
    }

    /// Stop the periodic refresh. Listeners stay attached.
    pub fn shutdown(&mut self) {
        if self.refresh_task.stop() {
            dev_log!(self.inner.mode, "[FeatureManager] Refresh stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.refresh_task.is_running()
    }

    /// Recompute the state snapshot now
    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    pub async fn register_plugin(&self, feature: FeatureDefinition) -> bool {
        let id = feature.id.clone();
        let pending = PluginStatus {
            id: feature.id.clone(),
            name: feature.name.clone(),
            version: feature.version.clone(),
            enabled: false,
            registered: false,
            last_error: None,
            registration_time: None,
            disable_reason: None,
        };
        let result = self.inner.registry.register(feature).await;
        self.inner.settle("register", &id, result, Some(pending)).await
    }

    pub async fn unregister_plugin(&self, feature_id: &str) -> bool {
        let result = self.inner.registry.unregister(feature_id).await;
        self.inner.settle("unregister", feature_id, result, None).await
    }

    pub async fn enable_plugin(&self, feature_id: &str) -> bool {
        let result = self.inner.registry.enable_feature(feature_id).await;
        self.inner.settle("enable", feature_id, result, None).await
    }

    pub async fn disable_plugin(&self, feature_id: &str) -> bool {
        let result = self.inner.registry.disable_feature(feature_id).await;
        self.inner.settle("disable", feature_id, result, None).await
    }

    /// Route a runtime error to the registry and record it against the plugin.
    /// Returns true if the plugin was disabled as a result.
    pub async fn report_error(&self, error: FeatureRuntimeError) -> bool {
        let disabled = self.inner.registry.handle_runtime_error(&error).await;
        self.inner
            .record_error(&error.feature_id, error.to_string(), None);
        self.inner.refresh().await;
        disabled
    }

    /// Register a state listener. It is called once immediately with the
    /// current state, then on every refresh.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ManagerState) + Send + Sync + 'static,
    {
        let listener: StateListener = Arc::new(listener);
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock_recover(&self.inner.listeners, "feature manager listeners").push((id, listener.clone()));

        let current = self.get_state();
        call_isolated("feature manager listener", || listener(&current));

        Subscription {
            manager: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        lock_recover(&self.inner.listeners, "feature manager listeners").len()
    }

    pub fn get_state(&self) -> ManagerState {
        lock_recover(&self.inner.state, "feature manager state").clone()
    }

    pub fn get_plugin_status(&self, plugin_id: &str) -> Option<PluginStatus> {
        lock_recover(&self.inner.state, "feature manager state")
            .plugins
            .get(plugin_id)
            .cloned()
    }

    pub fn get_all_plugin_statuses(&self) -> Vec<PluginStatus> {
        lock_recover(&self.inner.state, "feature manager state")
            .plugins
            .values()
            .cloned()
            .collect()
    }

    pub fn is_plugin_ready(&self, plugin_id: &str) -> bool {
        self.get_plugin_status(plugin_id)
            .is_some_and(|status| status.is_ready())
    }

    pub fn get_health_report(&self) -> HealthReport {
        let details = self.get_all_plugin_statuses();
        let mut issues = Vec::new();
        let mut summary = HealthSummary::default();

        for status in &details {
            if status.registered {
                summary.total_plugins += 1;
                if status.enabled {
                    summary.enabled_plugins += 1;
                } else {
                    summary.disabled_plugins += 1;
                }
            }
            if let Some(error) = &status.last_error {
                summary.errored_plugins += 1;
                issues.push(format!("Plugin {} has error: {}", status.id, error));
            }
            if status.is_unexpectedly_disabled() {
                issues.push(format!("Plugin {} is unexpectedly disabled", status.id));
            }
        }

        HealthReport {
            healthy: issues.is_empty(),
            issues,
            summary,
            details,
        }
    }

    /// Render the health report as a table
    pub fn status_table(&self) -> String {
        let report = self.get_health_report();
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["Plugin", "Version", "Registered", "Enabled", "Error"]);
        for status in &report.details {
            table.add_row(row![
                status.id,
                status.version,
                status.registered,
                status.enabled,
                status.last_error.as_deref().unwrap_or("-")
            ]);
        }
        table.to_string()
    }

    /// Dump the health report to the log in development mode
    pub fn log_status(&self) {
        if !self.inner.mode.is_development() {
            return;
        }
        let report = self.get_health_report();
        log::info!(
            "[FeatureManager] {} plugins, {} enabled, {} errored, healthy: {}",
            report.summary.total_plugins,
            report.summary.enabled_plugins,
            report.summary.errored_plugins,
            report.healthy
        );
        for line in self.status_table().lines() {
            log::info!("{}", line);
        }
        for issue in &report.issues {
            log::warn!("[FeatureManager] {}", issue);
        }
    }
}

impl std::fmt::Debug for FeatureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureManager")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}
