//! Dependency Manager
//!
//! Resolves registered external dependencies one at a time in ascending load
//! order. Each check attempt is raced against the configured timeout and
//! retried with a fixed delay; a dependency whose check settles with `false`
//! may be rescued by a fallback. A completed pass is remembered until `reset()` or `clear()`.

use crate::core::mode::RuntimeMode;
use crate::core::retry::{race_timeout, RetryPolicy};
use crate::dependency::error::{DependencyError, DependencyResult};
use crate::dependency::types::{
    DependencyManagerConfig, DependencyResolution, FailureStrategy, FeatureDependency,
    ValidationReport,
};
use crate::{dev_log, dev_warn};
use std::collections::BTreeMap;
use tokio::time::Instant;

#[derive(Debug)]
pub struct DependencyManager {
    /// Registration order is kept so that equal load orders resolve stably
    dependencies: Vec<FeatureDependency>,
    resolutions: Vec<DependencyResolution>,
    resolved: bool,
    config: DependencyManagerConfig,
    mode: RuntimeMode,
}

impl DependencyManager {
    pub fn new(config: DependencyManagerConfig, mode: RuntimeMode) -> Self {
        Self {
            dependencies: Vec::new(),
            resolutions: Vec::new(),
            resolved: false,
            config,
            mode,
        }
    }

    /// Add a dependency. A dependency with the same id is replaced in place.
    pub fn register_dependency(&mut self, dependency: FeatureDependency) {
        dev_log!(
            self.mode,
            "[DependencyManager] Registered dependency: {}",
            dependency.id
        );
        match self.dependencies.iter_mut().find(|d| d.id == dependency.id) {
            Some(existing) => *existing = dependency,
            None => self.dependencies.push(dependency),
        }
    }

    pub fn register_dependencies(&mut self, dependencies: impl IntoIterator<Item = FeatureDependency>) {
        for dependency in dependencies {
            self.register_dependency(dependency);
        }
    }

    /// Resolve every registered dependency.
    ///
    /// Returns immediately once a pass has completed. Under the `fail`
    /// strategy the first unresolved required dependency aborts the pass and
    /// later dependencies are never attempted; otherwise the pass always
    /// completes with `Ok(true)` and degradation has to be read from
    /// [`get_unresolved_required`](Self::get_unresolved_required).
    pub async fn resolve_all(&mut self) -> DependencyResult<bool> {
        if self.resolved {
            dev_warn!(self.mode, "[DependencyManager] Dependencies already resolved");
            return Ok(true);
        }

        let mut all_required_resolved = true;
        for dependency in self.sorted_dependencies() {
            let resolution = self.resolve_dependency(&dependency).await;
            let resolved = resolution.resolved;
            self.store_resolution(resolution);

            if !resolved && dependency.required {
                all_required_resolved = false;
                if self.config.failure_strategy == FailureStrategy::Fail {
                    return Err(DependencyError::RequiredDependencyFailed {
                        id: dependency.id.clone(),
                    });
                }
            }
        }

        self.resolved =
            all_required_resolved || self.config.failure_strategy != FailureStrategy::Fail;

        dev_log!(
            self.mode,
            "[DependencyManager] Resolution complete: total={} resolved={} failed={}",
            self.dependencies.len(),
            self.get_resolved_count(),
            self.get_failed_count()
        );
        Ok(self.resolved)
    }

    async fn resolve_dependency(&self, dependency: &FeatureDependency) -> DependencyResolution {
        let started = Instant::now();

        let (mut resolved, error) = if dependency.has_check() {
            match self.attempt_resolution(dependency).await {
                Ok(resolved) => (resolved, None),
                Err(err) => (false, Some(err)),
            }
        } else {
            (true, None)
        };

        // A check that errored or timed out is final; only a check that
        // settled with `false` may be rescued
        let mut fallback_used = false;
        if !resolved && error.is_none() {
            if let Some(fallback) = &dependency.fallback {
                match fallback().await {
                    Ok(()) => {
                        resolved = true;
                        fallback_used = true;
                        dev_log!(
                            self.mode,
                            "[DependencyManager] Using fallback for: {}",
                            dependency.id
                        );
                    }
                    Err(fallback_err) => {
                        let failure = DependencyError::FallbackFailed {
                            id: dependency.id.clone(),
                            message: fallback_err.to_string(),
                        };
                        log::debug!("[DependencyManager] {}", failure);
                    }
                }
            }
        }

        if !resolved {
            self.report_failure(dependency, error.as_ref());
        }

        DependencyResolution {
            dependency_id: dependency.id.clone(),
            name: dependency.name.clone(),
            required: dependency.required,
            resolved,
            error: error.map(|e| e.to_string()),
            fallback_used,
            load_time: started.elapsed(),
        }
    }

    /// Run the check with timeout and retries.
    ///
    /// `Ok(true)` on the first attempt that confirms availability; an error
    /// on a non-final attempt is retried after the configured delay; the
    /// final attempt's error is returned. Attempts that settle with `false`
    /// are retried without delay and end in `Ok(false)`.
    async fn attempt_resolution(&self, dependency: &FeatureDependency) -> DependencyResult<bool> {
        let Some(check) = &dependency.check else {
            return Ok(true);
        };
        let policy = RetryPolicy {
            retries: self.config.retry_attempts,
            delay: self.config.retry_delay,
        };

        for attempt in 0..policy.total_attempts() {
            let outcome = race_timeout(
                self.config.timeout,
                async {
                    check().await.map_err(|err| DependencyError::CheckFailed {
                        id: dependency.id.clone(),
                        message: err.to_string(),
                    })
                },
                || DependencyError::Timeout,
            )
            .await;

            match outcome {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    log::trace!(
                        "[DependencyManager] {} not available (attempt {})",
                        dependency.id,
                        attempt + 1
                    );
                }
                Err(err) if policy.is_final_attempt(attempt) => return Err(err),
                Err(err) => {
                    log::debug!(
                        "[DependencyManager] {} attempt {} failed: {}; retrying",
                        dependency.id,
                        attempt + 1,
                        err
                    );
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
        Ok(false)
    }

    fn report_failure(&self, dependency: &FeatureDependency, error: Option<&DependencyError>) {
        let detail = error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "check did not confirm availability".to_string());
        match self.config.failure_strategy {
            FailureStrategy::Warn => log::warn!(
                "[DependencyManager] Dependency resolution failed: {} ({})",
                dependency.id,
                detail
            ),
            FailureStrategy::Continue => log::debug!(
                "[DependencyManager] Dependency resolution failed: {} ({})",
                dependency.id,
                detail
            ),
            FailureStrategy::Fail => log::error!(
                "[DependencyManager] Dependency resolution failed: {} ({})",
                dependency.id,
                detail
            ),
        }
    }

    fn sorted_dependencies(&self) -> Vec<FeatureDependency> {
        let mut sorted = self.dependencies.clone();
        sorted.sort_by_key(|d| d.load_order);
        sorted
    }

    fn store_resolution(&mut self, resolution: DependencyResolution) {
        match self
            .resolutions
            .iter_mut()
            .find(|r| r.dependency_id == resolution.dependency_id)
        {
            Some(existing) => *existing = resolution,
            None => self.resolutions.push(resolution),
        }
    }

    /// Static checks over the registered set. Never touches resolution state.
    pub fn validate_dependencies(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for dependency in &self.dependencies {
            if dependency.id.trim().is_empty() {
                errors.push(format!(
                    "Dependency '{}' has an empty id",
                    dependency.name
                ));
            }
            if dependency.name.trim().is_empty() {
                errors.push(format!("Dependency {} has an empty name", dependency.id));
            }
        }

        let mut by_order: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
        for dependency in &self.dependencies {
            by_order
                .entry(dependency.load_order)
                .or_default()
                .push(dependency.id.as_str());
        }
        if by_order.len() != self.dependencies.len() {
            warnings.push("Duplicate load orders detected".to_string());
            for (order, ids) in &by_order {
                for (i, first) in ids.iter().enumerate() {
                    for second in &ids[i + 1..] {
                        warnings.push(format!(
                            "Dependencies {} and {} have the same load order ({})",
                            first, second, order
                        ));
                    }
                }
            }
        }

        for dependency in &self.dependencies {
            if dependency.required && !dependency.has_check() && !dependency.has_fallback() {
                warnings.push(format!(
                    "Required dependency {} has no check function or fallback",
                    dependency.id
                ));
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn is_dependency_resolved(&self, id: &str) -> bool {
        self.get_dependency_resolution(id)
            .is_some_and(|r| r.resolved)
    }

    pub fn get_dependency_resolution(&self, id: &str) -> Option<&DependencyResolution> {
        self.resolutions.iter().find(|r| r.dependency_id == id)
    }

    /// Resolutions in the order they were produced
    pub fn get_all_resolutions(&self) -> &[DependencyResolution] {
        &self.resolutions
    }

    pub fn get_resolved_count(&self) -> usize {
        self.resolutions.iter().filter(|r| r.resolved).count()
    }

    pub fn get_failed_count(&self) -> usize {
        self.resolutions.iter().filter(|r| !r.resolved).count()
    }

    /// True once a resolution pass has completed
    pub fn are_all_resolved(&self) -> bool {
        self.resolved
    }

    /// Required dependencies without a successful resolution
    pub fn get_unresolved_required(&self) -> Vec<&FeatureDependency> {
        self.dependencies
            .iter()
            .filter(|d| d.required && !self.is_dependency_resolved(&d.id))
            .collect()
    }

    /// True if no required dependency is unresolved
    pub fn is_healthy(&self) -> bool {
        self.get_unresolved_required().is_empty()
    }

    pub fn get_dependency(&self, id: &str) -> Option<&FeatureDependency> {
        self.dependencies.iter().find(|d| d.id == id)
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Forget resolution results, keeping the registered dependencies
    pub fn reset(&mut self) {
        self.resolutions.clear();
        self.resolved = false;
        dev_log!(self.mode, "[DependencyManager] Reset resolution state");
    }

    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.resolutions.clear();
        self.resolved = false;
        dev_log!(self.mode, "[DependencyManager] Cleared all dependencies");
    }

    pub fn config(&self) -> &DependencyManagerConfig {
        &self.config
    }

    pub fn update_config(&mut self, update: impl FnOnce(&mut DependencyManagerConfig)) {
        update(&mut self.config);
    }
}

impl Default for DependencyManager {
    fn default() -> Self {
        Self::new(DependencyManagerConfig::default(), RuntimeMode::default())
    }
}
