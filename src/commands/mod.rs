//! Subcommand implementations

pub mod instruments;
pub mod scan;
pub mod universe;
