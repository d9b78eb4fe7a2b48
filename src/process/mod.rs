//! External process plumbing
//!
//! Tools are described by a [`ToolCommand`], launched by a [`ProcessRunner`]
//! and observed line by line. Cancellation terminates the whole process group:
//! SIGTERM first, SIGKILL once the grace period has passed.

mod command;
mod deps;
mod runner;

pub use command::ToolCommand;
pub use deps::{Toolchain, is_available};
pub use runner::{CapturedOutput, ProcessObserver, ProcessRunner, RunOutcome};

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests;
