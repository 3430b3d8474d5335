//! Subcommand implementations

use clap::Args;

pub mod init;
pub mod read;
pub mod remove;
pub mod write;

#[derive(Debug, Args)]
pub struct DocumentArg {
    /// Document id
    pub id: i64,
}
