//! Dependency manager tests
//!
//! Timing-sensitive cases run on paused tokio time so timeouts and retry
//! delays elapse instantly.

use crate::core::mode::RuntimeMode;
use crate::dependency::api::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn manager_with(strategy: FailureStrategy) -> DependencyManager {
    DependencyManager::new(
        DependencyManagerConfig {
            failure_strategy: strategy,
            ..DependencyManagerConfig::default()
        },
        RuntimeMode::Test,
    )
}

/// Check that counts its invocations and always reports `available`
fn counted_check(id: &str, order: i64, available: bool, calls: &Arc<AtomicUsize>) -> FeatureDependency {
    let calls = calls.clone();
    FeatureDependency::new(id, id.to_uppercase(), order).with_check(move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<bool, ProbeError>(available)
        }
    })
}

#[tokio::test]
async fn test_required_dependency_resolves() {
    let mut manager = manager_with(FailureStrategy::Warn);
    let calls = Arc::new(AtomicUsize::new(0));
    manager.register_dependency(counted_check("a", 1, true, &calls).required());

    assert!(manager.resolve_all().await.unwrap());
    assert_eq!(manager.get_resolved_count(), 1);
    assert_eq!(manager.get_failed_count(), 0);
    assert!(manager.is_dependency_resolved("a"));
    assert!(manager.is_healthy());
}

#[tokio::test]
async fn test_fail_strategy_names_the_failed_dependency() {
    let mut manager = manager_with(FailureStrategy::Fail);
    let calls = Arc::new(AtomicUsize::new(0));
    let later = Arc::new(AtomicUsize::new(0));
    manager.register_dependency(counted_check("b", 1, false, &calls).required());
    manager.register_dependency(counted_check("c", 2, true, &later));

    let err = manager.resolve_all().await.unwrap_err();
    assert_eq!(err.to_string(), "Required dependency failed: b");
    assert_eq!(later.load(Ordering::SeqCst), 0, "pass aborted before c");
    assert!(!manager.are_all_resolved());
    assert_eq!(manager.get_failed_count(), 1);
}

#[tokio::test]
async fn test_warn_strategy_completes_but_reports_degradation() {
    let mut manager = manager_with(FailureStrategy::Warn);
    let calls = Arc::new(AtomicUsize::new(0));
    manager.register_dependency(counted_check("gpu", 1, false, &calls).required());
    manager.register_dependency(counted_check("fonts", 2, true, &calls));

    assert!(manager.resolve_all().await.unwrap());
    assert!(manager.are_all_resolved());
    assert!(!manager.is_healthy());
    let unresolved: Vec<&str> = manager
        .get_unresolved_required()
        .iter()
        .map(|d| d.id.as_str())
        .collect();
    assert_eq!(unresolved, vec!["gpu"]);
    // false on every attempt: one call per attempt, no error recorded
    assert_eq!(manager.get_dependency_resolution("gpu").unwrap().error, None);
}

#[tokio::test]
async fn test_resolve_all_is_idempotent_until_reset() {
    let mut manager = manager_with(FailureStrategy::Warn);
    let calls = Arc::new(AtomicUsize::new(0));
    manager.register_dependency(counted_check("a", 1, true, &calls));

    manager.resolve_all().await.unwrap();
    manager.resolve_all().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    manager.reset();
    assert!(manager.get_all_resolutions().is_empty());
    assert!(!manager.are_all_resolved());
    manager.resolve_all().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    manager.clear();
    assert_eq!(manager.dependency_count(), 0);
}

#[tokio::test]
async fn test_resolution_follows_load_order() {
    let mut manager = manager_with(FailureStrategy::Warn);
    let order = Arc::new(Mutex::new(Vec::new()));

    for load_order in [3, 1, 2] {
        let order = order.clone();
        manager.register_dependency(
            FeatureDependency::new(format!("dep-{}", load_order), "Dep", load_order).with_sync_check(
                move || {
                    order.lock().unwrap().push(load_order);
                    Ok(true)
                },
            ),
        );
    }

    manager.resolve_all().await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);

    let ids: Vec<&str> = manager
        .get_all_resolutions()
        .iter()
        .map(|r| r.dependency_id.as_str())
        .collect();
    assert_eq!(ids, vec!["dep-1", "dep-2", "dep-3"]);
}

#[tokio::test(start_paused = true)]
async fn test_check_succeeding_on_final_retry() {
    let mut manager = manager_with(FailureStrategy::Warn);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    manager.register_dependency(
        FeatureDependency::new("tiles", "Tile server", 1)
            .required()
            .with_check(move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 4 {
                        Err::<bool, ProbeError>(format!("attempt {} refused", attempt).into())
                    } else {
                        Ok(true)
                    }
                }
            }),
    );

    assert!(manager.resolve_all().await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let resolution = manager.get_dependency_resolution("tiles").unwrap();
    assert!(resolution.resolved);
    assert!(resolution.error.is_none());
    // three retry delays of one second each
    assert!(resolution.load_time >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_final_error_is_recorded() {
    let mut manager = manager_with(FailureStrategy::Continue);
    manager.update_config(|config| config.retry_attempts = 1);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    manager.register_dependency(FeatureDependency::new("db", "Database", 1).with_sync_check(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("connection refused".into())
        },
    ));

    assert!(manager.resolve_all().await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let resolution = manager.get_dependency_resolution("db").unwrap();
    assert!(!resolution.resolved);
    assert_eq!(resolution.error.as_deref(), Some("connection refused"));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_check_times_out_without_blocking_later_dependencies() {
    let mut manager = DependencyManager::new(
        DependencyManagerConfig {
            timeout: Duration::from_millis(200),
            retry_attempts: 0,
            ..DependencyManagerConfig::default()
        },
        RuntimeMode::Test,
    );
    manager.register_dependency(
        FeatureDependency::new("hang", "Never settles", 1)
            .with_check(|| futures::future::pending::<Result<bool, ProbeError>>()),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    manager.register_dependency(counted_check("next", 2, true, &calls));

    let started = tokio::time::Instant::now();
    assert!(manager.resolve_all().await.unwrap());
    assert!(started.elapsed() < Duration::from_millis(300));

    let hang = manager.get_dependency_resolution("hang").unwrap();
    assert!(!hang.resolved);
    assert_eq!(hang.error.as_deref(), Some("Dependency resolution timeout"));
    assert!(manager.is_dependency_resolved("next"));
}

#[tokio::test]
async fn test_fallback_rescues_unavailable_dependency() {
    let mut manager = manager_with(FailureStrategy::Fail);
    manager.update_config(|config| config.retry_attempts = 0);
    manager.register_dependency(
        FeatureDependency::new("webgl", "WebGL", 1)
            .required()
            .with_sync_check(|| Ok(false))
            .with_fallback(|| async { Ok::<(), ProbeError>(()) }),
    );

    assert!(manager.resolve_all().await.unwrap());
    let resolution = manager.get_dependency_resolution("webgl").unwrap();
    assert!(resolution.resolved);
    assert!(resolution.fallback_used);
}

#[tokio::test]
async fn test_failing_fallback_is_swallowed() {
    let mut manager = manager_with(FailureStrategy::Warn);
    manager.update_config(|config| config.retry_attempts = 0);
    manager.register_dependency(
        FeatureDependency::new("webgl", "WebGL", 1)
            .with_sync_check(|| Ok(false))
            .with_sync_fallback(|| Err("no software renderer".into())),
    );

    assert!(manager.resolve_all().await.unwrap());
    let resolution = manager.get_dependency_resolution("webgl").unwrap();
    assert!(!resolution.resolved);
    assert!(!resolution.fallback_used);
    assert!(resolution.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fallback_skipped_after_check_timeout() {
    let mut manager = DependencyManager::new(
        DependencyManagerConfig {
            timeout: Duration::from_millis(100),
            retry_attempts: 0,
            failure_strategy: FailureStrategy::Fail,
            ..DependencyManagerConfig::default()
        },
        RuntimeMode::Test,
    );
    let fallback_calls = Arc::new(AtomicUsize::new(0));
    let counter = fallback_calls.clone();
    manager.register_dependency(
        FeatureDependency::new("hang", "Never settles", 1)
            .required()
            .with_check(|| futures::future::pending::<Result<bool, ProbeError>>())
            .with_sync_fallback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );

    let err = manager.resolve_all().await.unwrap_err();
    assert_eq!(err.to_string(), "Required dependency failed: hang");
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);

    let resolution = manager.get_dependency_resolution("hang").unwrap();
    assert!(!resolution.resolved);
    assert!(!resolution.fallback_used);
    assert_eq!(resolution.error.as_deref(), Some("Dependency resolution timeout"));
}

#[tokio::test]
async fn test_fallback_skipped_after_check_error() {
    let mut manager = manager_with(FailureStrategy::Warn);
    manager.update_config(|config| config.retry_attempts = 0);
    manager.register_dependency(
        FeatureDependency::new("webgl", "WebGL", 1)
            .with_sync_check(|| Err("no context".into()))
            .with_fallback(|| async { Ok::<(), ProbeError>(()) }),
    );

    assert!(manager.resolve_all().await.unwrap());
    let resolution = manager.get_dependency_resolution("webgl").unwrap();
    assert!(!resolution.resolved);
    assert!(!resolution.fallback_used);
    assert_eq!(resolution.error.as_deref(), Some("no context"));
}

#[tokio::test]
async fn test_dependency_without_check_resolves_trivially() {
    let mut manager = manager_with(FailureStrategy::Fail);
    manager.register_dependency(FeatureDependency::new("static", "Static assets", 1).required());
    assert!(manager.resolve_all().await.unwrap());
    assert!(manager.is_dependency_resolved("static"));
}

#[test]
fn test_reregistration_replaces_in_place() {
    let mut manager = manager_with(FailureStrategy::Warn);
    manager.register_dependencies([
        FeatureDependency::new("a", "A", 1),
        FeatureDependency::new("b", "B", 2),
    ]);
    manager.register_dependency(FeatureDependency::new("a", "A v2", 1).with_version("2.0"));

    assert_eq!(manager.dependency_count(), 2);
    let a = manager.get_dependency("a").unwrap();
    assert_eq!(a.name, "A v2");
    assert_eq!(a.version.as_deref(), Some("2.0"));
}

#[test]
fn test_validation_flags_duplicate_orders_and_unverifiable_required() {
    let mut manager = manager_with(FailureStrategy::Warn);
    manager.register_dependencies([
        FeatureDependency::new("a", "A", 1).with_sync_check(|| Ok(true)),
        FeatureDependency::new("b", "B", 1).with_sync_check(|| Ok(true)),
        FeatureDependency::new("c", "C", 2).required(),
        FeatureDependency::new("d", "", 3),
    ]);

    let report = manager.validate_dependencies();
    assert!(!report.valid);
    assert_eq!(report.errors, vec!["Dependency d has an empty name"]);
    assert!(report
        .warnings
        .contains(&"Duplicate load orders detected".to_string()));
    assert!(report
        .warnings
        .contains(&"Dependencies a and b have the same load order (1)".to_string()));
    assert!(report
        .warnings
        .contains(&"Required dependency c has no check function or fallback".to_string()));

    // pure: no resolution state touched
    assert!(manager.get_all_resolutions().is_empty());
}
