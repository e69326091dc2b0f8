//! Subcommand handlers

pub mod inspect;
pub mod migrate;

pub use inspect::{list_archives, show_counts};
pub use migrate::{run_migration, MigrateArgs};
