//! Blocking external command execution for `*_cmd` style settings.
//!
//! The resolver never spawns processes itself; it hands the command line to a
//! [`CommandRunner`]. [`ShellCommandRunner`] is the stock implementation and
//! runs the line through `sh -c`, returning decoded stdout.
//!
//! There is no timeout by default. Callers that need bounded latency build the
//! runner with [`ShellCommandRunner::with_timeout`] or wrap it with their own
//! policy.

pub mod runner;

pub use runner::{CommandRunner, ShellCommandRunner};
