//! Generic error handling utilities
//!
//! Errors from every subsystem are reported at the CLI boundary through one
//! function, which decides how much detail to show based on whether the user
//! can act on the error.

/// Errors that can tell user-actionable failures apart from system failures
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// True for errors such as a bad configuration value or an unknown
    /// feature id, where the message itself tells the user what to fix
    fn is_user_actionable(&self) -> bool;

    /// The message to show when the error is user-actionable
    fn user_message(&self) -> Option<String>;
}

/// Log an error with a level of detail that matches its kind.
///
/// User-actionable errors show their own message; system errors show the
/// operation context, with the error itself at debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => {
            log::error!("{}: {}", operation_context, user_msg);
        }
        _ => log::error!("{} failed", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
