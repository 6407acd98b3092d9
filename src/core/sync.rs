//! Synchronisation helpers
//!
//! Observer callbacks are user code and may panic. Panics are caught at the
//! dispatch site, but a panic while a std lock is held still poisons it; the
//! state protected here stays consistent across such a panic, so poisoned
//! locks are recovered rather than propagated.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a previous holder panicked
pub fn lock_recover<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poison_err| {
        log::warn!(
            "Recovered poisoned lock in {} (a panic occurred while it was held)",
            context
        );
        poison_err.into_inner()
    })
}

/// Run an observer callback, converting a panic into a logged error.
///
/// Returns false if the callback panicked.
pub fn call_isolated(context: &str, callback: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            log::error!("Error in {}: {}", context, message);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_recover_after_poison() {
        let shared = Arc::new(Mutex::new(5));
        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(shared.is_poisoned());
        let guard = lock_recover(&shared, "test");
        assert_eq!(*guard, 5);
    }

    #[test]
    fn test_call_isolated_reports_panics() {
        assert!(call_isolated("ok handler", || {}));
        assert!(!call_isolated("bad handler", || panic!("listener blew up")));
        assert!(!call_isolated("bad handler", || {
            panic!("{}", String::from("formatted"))
        }));
    }
}
