//! CLI subcommands.

pub mod render;
pub mod run;
pub mod status;
