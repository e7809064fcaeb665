//! Stable exit codes for the `buildloop` binary.

/// Loop stopped by an interrupt.
pub const STOPPED: i32 = 0;
/// Startup or iteration failure (config, credentials, bootstrap, gateway, write).
pub const FAILED: i32 = 1;
