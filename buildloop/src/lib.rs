//! Unattended propose-then-build loop.
//!
//! Two plain-text documents drive the loop: a target description and a record
//! of what has been built. Each iteration asks a reasoning service for the next
//! small increment, asks again for that increment's content, and applies the
//! reply to disk. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (reply parsing, artifact name
//!   checks, display truncation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (state documents, config, prompts,
//!   the reasoning-service gateway, transcripts).
//!
//! [`looping`] drives iterations over both, and [`stop`] carries the stop
//! signal it observes between iterations.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod stop;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
