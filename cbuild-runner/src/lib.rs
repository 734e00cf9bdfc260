//! Cross-platform command runner for the build engine's compile and link
//! steps. The crate exposes a trait-based executor so the engine can swap
//! the underlying process strategy (system shell, dry-run logging, or a
//! test double) without depending on the concrete spawn mechanism.
//!
//! ## Modules
//!
//! - [`executor`] - Command execution strategies (process, dry-run)

pub mod executor;

#[cfg(feature = "dry-run")]
pub use executor::DryRunCommandRunner;
#[cfg(feature = "exec-events")]
pub use executor::EventfulCommandRunner;
pub use executor::{CommandInvocation, CommandOutput, CommandRunner, CommandStatus};
