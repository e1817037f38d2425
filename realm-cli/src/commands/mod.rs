//! Subcommands of the `realm` binary

pub mod modules;
pub mod serve;
