//! Subcommand handlers

mod devices;
mod session;

pub(crate) use devices::{list_command, remove_command};
pub(crate) use session::{auth_command, register_command};
