//! Lexical `#include` dependency-chain scanner (spec §3, §4.2).
//!
//! The scanner never parses C/C++ grammar — it only has to find
//! `#include` directives reliably enough to build an accurate dependency
//! chain, memoized per build in the [`cbuild_registry::UpdateSet`]'s
//! Chain Status table.

mod arena;
mod chain;
mod lex;

pub use arena::ScanArena;
pub use chain::scan_dependency_chain;
pub use lex::{ScanResult, scan_includes};
