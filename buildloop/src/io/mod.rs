//! I/O helpers for the loop.

pub mod config;
pub mod gateway;
pub mod iteration_log;
pub mod prompt;
pub mod state_store;
