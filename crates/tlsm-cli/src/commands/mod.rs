//! CLI subcommands.

pub(crate) mod check;
pub(crate) mod console;
pub(crate) mod validate;
