//! Shared helpers reused across the cbuild crates, kept decoupled from any
//! single crate's configuration or telemetry wiring.

pub mod paths;

pub use paths::canonicalize_workspace;
