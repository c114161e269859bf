//! Asset blob copying shared by both pipelines

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::path_utils::is_plain_file_name;
use crate::types::Asset;

/// Outcome of copying a batch of asset files
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTally {
    pub copied: usize,
    /// Destination already held the same content-named file
    pub deduplicated: usize,
    pub missing: usize,
}

impl AssetTally {
    pub fn add(&mut self, other: AssetTally) {
        self.copied += other.copied;
        self.deduplicated += other.deduplicated;
        self.missing += other.missing;
    }
}

/// Copy the `md5ext` file of every asset from `from` into `to`
///
/// Missing or unreadable files are logged and skipped. Records without an
/// `md5ext` are ignored.
pub fn copy_asset_files(assets: &[Asset], from: &Path, to: &Path) -> AssetTally {
    let mut tally = AssetTally::default();

    for asset in assets {
        let Some(md5ext) = asset.md5ext.as_deref() else {
            tracing::debug!("Asset {:?} has no md5ext, skipping", asset.asset_id);
            continue;
        };
        if !is_plain_file_name(md5ext) {
            tracing::warn!("Refusing asset file name '{}'", md5ext);
            tally.missing += 1;
            continue;
        }

        let source = from.join(md5ext);
        if !source.is_file() {
            tracing::warn!("Missing asset file: {}", source.display());
            tally.missing += 1;
            continue;
        }

        let dest = to.join(md5ext);
        if dest.is_file() {
            tally.deduplicated += 1;
            continue;
        }

        let copied = fs::create_dir_all(to).and_then(|_| fs::copy(&source, &dest));
        match copied {
            Ok(_) => {
                tracing::debug!("Copied {}", md5ext);
                tally.copied += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to copy {} to {}: {}", md5ext, to.display(), e);
                tally.missing += 1;
            }
        }
    }

    tally
}
