//! media-retag: reconcile photo and video metadata tags
//!
//! Normalises the duplicated EXIF, IPTC, XMP and QuickTime fields of a media
//! library into one canonical set and renames files from it.

use anyhow::Result;

fn main() -> Result<()> {
    media_retag::cli::run()
}
