//! CLI subcommand implementations.

pub mod reconcile;
pub mod status;
