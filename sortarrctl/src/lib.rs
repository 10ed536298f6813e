//! Interactive front-end for `sortarr-core`: parses the command line, loads
//! sorter settings, drives one batch and answers disambiguation prompts.

pub mod cli;
pub mod config;
pub mod render;
pub mod session;

use sortarr_core::BatchSummary;

use crate::cli::{Cli, Command};

pub async fn run(cli: Cli) -> anyhow::Result<BatchSummary> {
    match cli.command {
        Command::Sort(args) => session::run_sort(args).await,
    }
}
