//! Disassembler: unpacked archive -> structured directory tree
//!
//! Reads `project.json` from an unpacked archive and writes one directory per
//! target, copying each target's assets out of the archive's flat pool.
//! Only an unreadable manifest aborts the run; everything else is logged,
//! counted in the report and skipped.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::allowlist;
use crate::archive::read_manifest;
use crate::assets::{copy_asset_files, AssetTally};
use crate::error::{Result, TranscodeError};
use crate::layout::{
    reset_subtrees, write_json, StructuredLayout, Subtree, ASSET_CONFIG_FILE, COSTUMES_DIR,
    MANIFEST_FILE, MISSING_URL_SENTINEL, SCRIPT_FILE, SOUNDS_DIR, SPRITE_META_FILE,
    STAGE_META_FILE,
};
use crate::path_utils::escape_target_name;
use crate::types::{Asset, Target};

/// Options for a disassembly run
#[derive(Debug, Clone, Default)]
pub struct DisassembleOptions {
    /// Reset the sprites, extensions, stage and fonts subtrees first
    pub clear: bool,
}

/// Summary of a disassembly run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassemblyReport {
    pub stage: bool,
    pub sprites: usize,
    pub extensions: usize,
    pub fonts: usize,
    pub assets: AssetTally,
    /// Targets skipped because they could not be read or written
    pub failed_targets: usize,
}

/// Disassemble the unpacked archive at `archive_root` into `structured_root`
pub fn disassemble(
    structured_root: &Path,
    archive_root: &Path,
    options: &DisassembleOptions,
) -> Result<DisassemblyReport> {
    let layout = StructuredLayout::new(structured_root);

    if options.clear {
        reset_subtrees(structured_root, &Subtree::ALL)?;
    }

    let manifest = read_manifest(archive_root)?;
    let targets = match manifest.get("targets") {
        None => Vec::new(),
        Some(Value::Array(targets)) => targets.clone(),
        Some(_) => {
            return Err(TranscodeError::MalformedManifest {
                path: archive_root.join(MANIFEST_FILE),
                reason: "'targets' is not an array".to_string(),
            })
        }
    };

    tracing::info!(
        "Disassembling {} targets from {} into {}",
        targets.len(),
        archive_root.display(),
        structured_root.display()
    );

    let mut report = DisassemblyReport::default();

    // Project-wide declarations first, then any a target carries itself
    let declarations = std::iter::once(&manifest)
        .chain(targets.iter())
        .filter_map(|source| Some((source.get("extensions")?, source.get("extensionURLs")?)));
    let mut extensions = Map::new();
    let mut declared = false;
    for (ids, urls) in declarations {
        match merge_extensions(&mut extensions, ids, urls, &layout.extensions_file()) {
            Ok(()) => declared = true,
            Err(e) => tracing::error!("Skipping extensions: {}", e),
        }
    }
    if declared {
        match write_json(&layout.extensions_file(), &extensions) {
            Ok(()) => report.extensions = extensions.len(),
            Err(e) => tracing::error!("Failed to write extensions: {}", e),
        }
    }

    if let Some(extension_data) = manifest.get("extensionData") {
        if let Err(e) = write_json(&layout.extension_data_file(), extension_data) {
            tracing::error!("Failed to write extension data: {}", e);
        }
    }

    let monitors = manifest.get("monitors").cloned().unwrap_or_else(|| json!([]));
    if let Err(e) = write_json(&layout.monitors_file(), &monitors) {
        tracing::error!("Failed to write monitors: {}", e);
    }

    let mut stage_written = false;
    let mut sprite_dirs = HashSet::new();

    for (index, raw) in targets.into_iter().enumerate() {
        let target: Target = match serde_json::from_value(raw) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!("Skipping unreadable target {}: {}", index, e);
                report.failed_targets += 1;
                continue;
            }
        };

        if target.is_stage {
            if stage_written {
                tracing::warn!("Ignoring extra stage target at index {}", index);
                continue;
            }
            stage_written = true;
            match write_stage(&layout, &target, archive_root) {
                Ok(tally) => {
                    report.stage = true;
                    report.assets.add(tally);
                }
                Err(e) => {
                    tracing::error!("Failed to write stage: {}", e);
                    report.failed_targets += 1;
                }
            }
            continue;
        }

        let name = match target.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                tracing::warn!("Skipping unnamed sprite at index {}", index);
                continue;
            }
        };
        // Case-insensitive filesystems would merge `Cat` and `cat`
        if !sprite_dirs.insert(escape_target_name(name).to_lowercase()) {
            tracing::warn!("Skipping duplicate sprite '{}' at index {}", name, index);
            report.failed_targets += 1;
            continue;
        }

        match write_sprite(&layout, &target, name, archive_root) {
            Ok(tally) => {
                report.sprites += 1;
                report.assets.add(tally);
            }
            Err(e) => {
                tracing::error!("Failed to write sprite '{}': {}", name, e);
                report.failed_targets += 1;
            }
        }
    }

    match manifest.get("customFonts") {
        Some(Value::Array(fonts)) if !fonts.is_empty() => {
            match write_fonts(&layout, fonts, archive_root) {
                Ok((count, tally)) => {
                    report.fonts = count;
                    report.assets.add(tally);
                }
                Err(e) => tracing::error!("Skipping custom fonts: {}", e),
            }
        }
        _ => {}
    }

    tracing::info!(
        "Disassembly complete: stage={}, sprites={}, assets copied={}, missing={}",
        report.stage,
        report.sprites,
        report.assets.copied,
        report.assets.missing
    );

    Ok(report)
}

/// Add each declared extension to `entries`, mapped to its URL
///
/// An id already present keeps its URL unless it only had the placeholder.
fn merge_extensions(
    entries: &mut Map<String, Value>,
    extensions: &Value,
    urls: &Value,
    path: &Path,
) -> Result<()> {
    let Some(extensions) = extensions.as_array() else {
        return Err(TranscodeError::MalformedManifest {
            path: path.to_path_buf(),
            reason: "'extensions' is not an array".to_string(),
        });
    };
    let Some(urls) = urls.as_object() else {
        return Err(TranscodeError::MalformedManifest {
            path: path.to_path_buf(),
            reason: "'extensionURLs' is not an object".to_string(),
        });
    };

    for ext in extensions {
        let Some(id) = ext.as_str() else {
            tracing::warn!("Ignoring non-string extension id: {}", ext);
            continue;
        };
        let known = entries
            .get(id)
            .is_some_and(|url| url.as_str() != Some(MISSING_URL_SENTINEL));
        if known {
            continue;
        }
        let url = urls
            .get(id)
            .cloned()
            .unwrap_or_else(|| Value::String(MISSING_URL_SENTINEL.to_string()));
        tracing::debug!("Extension '{}'", id);
        entries.insert(id.to_string(), url);
    }
    Ok(())
}

fn write_stage(layout: &StructuredLayout, target: &Target, archive_root: &Path) -> Result<AssetTally> {
    tracing::info!("Processing stage");
    let dir = layout.stage_dir();
    write_target(
        target,
        &dir,
        STAGE_META_FILE,
        &layout.stage_costumes_dir(),
        archive_root,
    )
}

fn write_sprite(
    layout: &StructuredLayout,
    target: &Target,
    name: &str,
    archive_root: &Path,
) -> Result<AssetTally> {
    tracing::info!("Processing sprite '{}'", name);
    let dir = layout.sprite_dir(name);
    let costumes_dir = dir.join(COSTUMES_DIR);
    write_target(target, &dir, SPRITE_META_FILE, &costumes_dir, archive_root)
}

/// Metadata, asset manifests, asset files and scripts for one target
fn write_target(
    target: &Target,
    dir: &Path,
    meta_file: &str,
    costumes_dir: &Path,
    archive_root: &Path,
) -> Result<AssetTally> {
    fs::create_dir_all(dir).map_err(|e| TranscodeError::io(dir, e))?;

    write_json(&dir.join(meta_file), &allowlist::select(target))?;

    let mut tally = AssetTally::default();
    tally.add(write_asset_group(&target.sounds, &dir.join(SOUNDS_DIR), archive_root)?);
    tally.add(write_asset_group(&target.costumes, costumes_dir, archive_root)?);

    write_json(&dir.join(SCRIPT_FILE), &target.blocks)?;
    Ok(tally)
}

fn write_asset_group(assets: &[Asset], dir: &Path, archive_root: &Path) -> Result<AssetTally> {
    write_json(&dir.join(ASSET_CONFIG_FILE), assets)?;
    Ok(copy_asset_files(assets, archive_root, dir))
}

/// Shared fonts config plus font files, written once per project
fn write_fonts(
    layout: &StructuredLayout,
    fonts: &[Value],
    archive_root: &Path,
) -> Result<(usize, AssetTally)> {
    tracing::info!("Processing {} custom fonts", fonts.len());
    let fonts: Vec<Asset> = serde_json::from_value(Value::Array(fonts.to_vec()))
        .map_err(|e| TranscodeError::json(layout.fonts_dir(), e))?;
    let dir = layout.fonts_dir();
    let tally = write_asset_group(&fonts, &dir, archive_root)?;
    Ok((fonts.len(), tally))
}
