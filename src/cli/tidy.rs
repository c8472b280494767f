//! Tidy command implementation: write tags, then file by artist.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::{execute, RunArgs};
use crate::pipeline::Action;
use crate::rename::RenameOptions;

#[derive(Args, Debug)]
pub struct TidyArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Only touch files whose XMP:ImageSupplierID matches
    #[arg(long, value_name = "ID")]
    pub supplier_id: String,

    /// Base directory for artist folders (default: the file's own directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

pub fn run(args: TidyArgs) -> Result<()> {
    let options = RenameOptions { new_dir: true, root: args.root.clone(), ..RenameOptions::default() };
    let action = Action::Tidy { supplier_id: args.supplier_id.clone() };
    execute(&args.run, action, Some(options))
}
