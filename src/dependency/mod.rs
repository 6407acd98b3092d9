//! External Dependency Resolution
//!
//! Named preconditions (capability probes) that a feature needs from its
//! environment, resolved sequentially in load order with per-attempt
//! timeouts, retries and optional fallbacks. Independent of the feature graph.

// Internal modules - all access should go through api module
pub(crate) mod error;
pub(crate) mod manager;
pub(crate) mod types;

// Public API module - the only public interface for dependency resolution
pub mod api;

#[cfg(test)]
mod tests;
