//! Helpers shared by the subcommands

pub(crate) mod reader;
