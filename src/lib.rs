pub mod app;
pub mod core;
pub mod dependency;
pub mod plugin;
pub mod realtime;
pub mod runtime;
