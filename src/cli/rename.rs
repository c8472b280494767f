//! Rename command implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::{execute, RunArgs};
use crate::pipeline::Action;
use crate::rename::RenameOptions;

#[derive(Args, Debug)]
pub struct RenameArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Move each file into a folder named after its artist
    #[arg(long)]
    pub new_dir: bool,

    /// Base directory for artist folders (default: the file's own directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Put videos in a separate subfolder
    #[arg(long)]
    pub sep_mp4: bool,

    /// Put live photos and their companions in a separate subfolder
    #[arg(long)]
    pub sep_mov: bool,
}

impl RenameArgs {
    pub fn options(&self) -> RenameOptions {
        RenameOptions {
            new_dir: self.new_dir,
            root: self.root.clone(),
            sep_mp4: self.sep_mp4,
            sep_mov: self.sep_mov,
            dry_run: false,
        }
    }
}

pub fn run(args: RenameArgs) -> Result<()> {
    let options = args.options();
    execute(&args.run, Action::Rename, Some(options))
}
