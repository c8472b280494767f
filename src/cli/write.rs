//! Write command implementation

use anyhow::Result;
use clap::Args;

use super::common::{execute, RunArgs};
use crate::pipeline::Action;

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

pub fn run(args: WriteArgs) -> Result<()> {
    execute(&args.run, Action::Write, None)
}
