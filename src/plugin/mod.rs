//! Feature Plugin System
//!
//! Registry of optional features with dependency integrity, plus a
//! non-failing management facade that publishes status snapshots.

// Internal modules - all access should go through api module
pub(crate) mod error;
pub(crate) mod graph;
pub(crate) mod manager;
pub(crate) mod registry;
pub(crate) mod types;

// Public API module - the only public interface for the plugin system
pub mod api;

#[cfg(test)]
mod tests;
