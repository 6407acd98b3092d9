//! Real-time Synchronisation
//!
//! Reconnecting, channel-based live-update client over a pluggable
//! transport, plus a per-URL client registry.

// Internal modules - all access should go through api module
pub(crate) mod client;
pub(crate) mod error;
pub(crate) mod event;
pub(crate) mod memory;
pub(crate) mod message;
pub(crate) mod registry;
pub(crate) mod transport;

// Public API module - the only public interface for the real-time client
pub mod api;

#[cfg(test)]
mod tests;
