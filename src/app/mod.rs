//! Application module

pub mod cli;
pub mod startup;
pub mod watch;
