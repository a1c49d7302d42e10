//! In-memory model representation

mod diagnostics;
mod ir;

pub use diagnostics::{has_errors, sort_diagnostics, Diagnostic, Severity};
pub use ir::*;
