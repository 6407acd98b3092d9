//! Test modules for the plugin system
//!
//! Cross-module scenarios that drive the registry through the manager facade.

mod utils;
