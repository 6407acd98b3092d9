//! Dependency descriptors, resolution records and manager configuration

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// Error type returned by check and fallback closures
pub type ProbeError = Box<dyn std::error::Error + Send + Sync>;

/// Capability probe: settles with `true` when the dependency is available
pub type CheckFn = Arc<dyn Fn() -> BoxFuture<'static, Result<bool, ProbeError>> + Send + Sync>;

/// Fallback run when the probe does not confirm availability
pub type FallbackFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), ProbeError>> + Send + Sync>;

/// A named external precondition
#[derive(Clone)]
pub struct FeatureDependency {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub required: bool,
    /// Position in the resolution sequence, ascending
    pub load_order: i64,
    pub check: Option<CheckFn>,
    pub fallback: Option<FallbackFn>,
}

impl FeatureDependency {
    /// An optional dependency with no check, which resolves trivially
    pub fn new(id: impl Into<String>, name: impl Into<String>, load_order: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
            required: false,
            load_order,
            check: None,
            fallback: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, ProbeError>> + Send + 'static,
    {
        self.check = Some(Arc::new(move || check().boxed()));
        self
    }

    pub fn with_sync_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> Result<bool, ProbeError> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(move || futures::future::ready(check()).boxed()));
        self
    }

    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move || fallback().boxed()));
        self
    }

    pub fn with_sync_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Result<(), ProbeError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(move || futures::future::ready(fallback()).boxed()));
        self
    }

    pub fn has_check(&self) -> bool {
        self.check.is_some()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

impl fmt::Debug for FeatureDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureDependency")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("required", &self.required)
            .field("load_order", &self.load_order)
            .field("check", &self.has_check())
            .field("fallback", &self.has_fallback())
            .finish()
    }
}

/// Outcome of resolving one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResolution {
    pub dependency_id: String,
    pub name: String,
    pub required: bool,
    pub resolved: bool,
    pub error: Option<String>,
    pub fallback_used: bool,
    pub load_time: Duration,
}

impl DependencyResolution {
    pub fn load_time_ms(&self) -> u128 {
        self.load_time.as_millis()
    }
}

/// What an unresolved required dependency does to the resolution pass
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum FailureStrategy {
    /// Abort the pass with an error
    Fail,
    /// Log at warn level and carry on
    #[default]
    Warn,
    /// Log at debug level and carry on
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyManagerConfig {
    pub auto_resolve: bool,
    #[serde(rename = "timeout_ms", with = "crate::core::config::duration_ms")]
    pub timeout: Duration,
    /// Extra attempts after the first
    pub retry_attempts: u32,
    #[serde(rename = "retry_delay_ms", with = "crate::core::config::duration_ms")]
    pub retry_delay: Duration,
    pub failure_strategy: FailureStrategy,
}

impl Default for DependencyManagerConfig {
    fn default() -> Self {
        Self {
            auto_resolve: true,
            timeout: Duration::from_millis(5000),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            failure_strategy: FailureStrategy::Warn,
        }
    }
}

/// Result of static validation over the registered dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}
