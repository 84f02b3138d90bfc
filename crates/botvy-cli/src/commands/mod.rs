//! CLI subcommands.

pub(crate) mod plugins;
pub(crate) mod run;
