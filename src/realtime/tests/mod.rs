//! Real-time client scenarios against the in-memory transport
//!
//! All tests run on paused tokio time; `settle()` lets spawned reader and
//! timer tasks catch up before assertions.

mod utils;
