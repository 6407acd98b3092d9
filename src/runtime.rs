//! Composition root
//!
//! A [`FeatureRuntime`] owns one feature registry, one management facade, one
//! dependency manager and one real-time client registry, all built from a
//! single [`Config`]. Nothing in the crate keeps a process-wide default; an
//! application creates a runtime, calls [`FeatureRuntime::init`], and calls
//! [`FeatureRuntime::shutdown`] on the way out.

use crate::core::config::Config;
use crate::core::mode::RuntimeMode;
use crate::dependency::api::{DependencyManager, DependencyResult};
use crate::plugin::api::{FeatureManager, FeatureRegistry, SharedFeatureRegistry};
use crate::realtime::api::{ClientRegistry, RealtimeClient, Transport, WebSocketTransport};
use std::sync::Arc;

#[derive(Debug)]
pub struct FeatureRuntime {
    config: Config,
    mode: RuntimeMode,
    registry: SharedFeatureRegistry,
    manager: FeatureManager,
    dependencies: DependencyManager,
    clients: ClientRegistry,
    initialized: bool,
}

impl FeatureRuntime {
    /// Runtime whose clients speak WebSocket
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, Arc::new(WebSocketTransport::new()))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let mode = config.mode();
        let registry = SharedFeatureRegistry::new(FeatureRegistry::with_mode(mode));
        let manager = FeatureManager::new(registry.clone(), config.manager.clone(), mode);
        let dependencies = DependencyManager::new(config.dependencies.clone(), mode);
        let clients = ClientRegistry::new(transport, config.realtime.clone(), mode);

        Self {
            config,
            mode,
            registry,
            manager,
            dependencies,
            clients,
            initialized: false,
        }
    }

    /// Start periodic health refresh and, if configured, resolve every
    /// registered external dependency.
    ///
    /// Returns whether a resolution pass completed. Under the `fail` strategy
    /// a failed required dependency is returned as an error and the manager
    /// is left stopped.
    pub async fn init(&mut self) -> DependencyResult<bool> {
        if self.initialized {
            return Ok(self.dependencies.are_all_resolved());
        }

        let all_resolved = if self.dependencies.config().auto_resolve {
            self.dependencies.resolve_all().await?
        } else {
            log::debug!("Automatic dependency resolution disabled");
            false
        };

        self.manager.start().await;
        self.initialized = true;
        log::info!(
            "Feature runtime started ({} mode, {} dependencies, {} features)",
            self.mode,
            self.dependencies.dependency_count(),
            self.manager.get_state().total_plugins
        );
        Ok(all_resolved)
    }

    /// Stop the refresh timer and close every real-time connection
    pub fn shutdown(&mut self) {
        self.manager.shutdown();
        self.clients.disconnect_all();
        if self.initialized {
            log::info!("Feature runtime stopped");
        }
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SharedFeatureRegistry {
        &self.registry
    }

    pub fn manager(&self) -> &FeatureManager {
        &self.manager
    }

    pub fn dependencies(&self) -> &DependencyManager {
        &self.dependencies
    }

    pub fn dependencies_mut(&mut self) -> &mut DependencyManager {
        &mut self.dependencies
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Client for the configured real-time URL
    pub fn realtime(&self) -> RealtimeClient {
        self.clients.default_client()
    }
}

impl Drop for FeatureRuntime {
    fn drop(&mut self) {
        if self.initialized {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::api::{FailureStrategy, FeatureDependency};
    use crate::plugin::api::FeatureDefinition;
    use crate::realtime::api::{ConnectionState, MemoryTransport};

    fn test_config() -> Config {
        Config {
            mode: Some(RuntimeMode::Test),
            ..Config::default()
        }
    }

    fn runtime(config: Config) -> (FeatureRuntime, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        (FeatureRuntime::with_transport(config, transport.clone()), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_resolves_dependencies_and_starts_manager() {
        let (mut runtime, _) = runtime(test_config());
        runtime
            .dependencies_mut()
            .register_dependency(FeatureDependency::new("storage", "Storage", 1).with_sync_check(|| Ok(true)));

        assert!(runtime.init().await.unwrap());
        assert!(runtime.is_initialized());
        assert!(runtime.manager().is_running());
        assert!(runtime.dependencies().is_dependency_resolved("storage"));

        // second init is a no-op
        assert!(runtime.init().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_propagates_required_failure_under_fail() {
        let mut config = test_config();
        config.dependencies.failure_strategy = FailureStrategy::Fail;
        config.dependencies.retry_attempts = 0;
        let (mut runtime, _) = runtime(config);
        runtime.dependencies_mut().register_dependency(
            FeatureDependency::new("gpu", "GPU", 1)
                .required()
                .with_sync_check(|| Ok(false)),
        );

        let err = runtime.init().await.unwrap_err();
        assert!(err.to_string().contains("gpu"));
        assert!(!runtime.is_initialized());
        assert!(!runtime.manager().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_resolve_off_skips_checks() {
        let mut config = test_config();
        config.dependencies.auto_resolve = false;
        let (mut runtime, _) = runtime(config);
        runtime
            .dependencies_mut()
            .register_dependency(FeatureDependency::new("storage", "Storage", 1).with_sync_check(|| Ok(true)));

        assert!(!runtime.init().await.unwrap());
        assert!(runtime.dependencies().get_all_resolutions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_manager_and_disconnects_clients() {
        let (mut runtime, transport) = runtime(test_config());
        runtime.init().await.unwrap();
        assert!(runtime.manager().register_plugin(FeatureDefinition::new("a", "A", "1.0.0").with_component(())).await);

        let client = runtime.realtime();
        client.connect().await.unwrap();
        assert_eq!(transport.open_count(), 1);
        assert_eq!(client.url(), runtime.config().realtime.url);

        runtime.shutdown();
        assert!(!runtime.manager().is_running());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        // registry content survives shutdown
        assert!(runtime.registry().is_registered("a").await);
    }
}
