//! Subcommand implementations

pub mod health;
pub mod records;
pub mod status;
