//! Packed archive codec
//!
//! A packed project is a zip holding `project.json` and a flat pool of asset
//! files named by their `md5ext`.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use serde_json::Value;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, TranscodeError};
use crate::layout::MANIFEST_FILE;
use crate::path_utils::path_to_string;

/// File extensions accepted as packed projects
pub const ARCHIVE_EXTENSIONS: &[&str] = &["sb3", "pmp"];

/// True if `path` has a packed-project extension
pub fn is_project_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Extract a packed project into `dest_dir`, returning the number of files
///
/// Entries whose names would escape `dest_dir` are skipped.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path).map_err(|e| TranscodeError::io(archive_path, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| TranscodeError::zip(archive_path, e))?;

    fs::create_dir_all(dest_dir).map_err(|e| TranscodeError::io(dest_dir, e))?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| TranscodeError::zip(archive_path, e))?;

        let entry_path = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                tracing::warn!("Skipping unsafe archive entry: {}", entry.name());
                continue;
            }
        };
        let output_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|e| TranscodeError::io(&output_path, e))?;
            continue;
        }
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TranscodeError::io(parent, e))?;
        }
        let mut outfile =
            File::create(&output_path).map_err(|e| TranscodeError::io(&output_path, e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| TranscodeError::io(&output_path, e))?;
        count += 1;
    }

    tracing::debug!("Unpacked {} files from {}", count, archive_path.display());
    Ok(count)
}

/// Zip every file under `build_dir` into `archive_path`, returning the entry count
pub fn pack(build_dir: &Path, archive_path: &Path) -> Result<usize> {
    if let Some(parent) = archive_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| TranscodeError::io(parent, e))?;
        }
    }

    let file = File::create(archive_path).map_err(|e| TranscodeError::io(archive_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::new();
    for entry in WalkDir::new(build_dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(build_dir).to_path_buf();
            TranscodeError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            entries.push(entry.into_path());
        }
    }
    // Deterministic archives
    entries.sort();

    for path in &entries {
        let relative = path
            .strip_prefix(build_dir)
            .map_err(|_| TranscodeError::InvalidPath(path.display().to_string()))?;
        zip.start_file(path_to_string(relative), options)
            .map_err(|e| TranscodeError::zip(archive_path, e))?;
        let mut source = File::open(path).map_err(|e| TranscodeError::io(path, e))?;
        io::copy(&mut source, &mut zip).map_err(|e| TranscodeError::io(archive_path, e))?;
    }

    zip.finish().map_err(|e| TranscodeError::zip(archive_path, e))?;
    Ok(entries.len())
}

/// Read and parse `project.json` from an unpacked archive directory
pub fn read_manifest(archive_root: &Path) -> Result<Value> {
    let path = archive_root.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path).map_err(|e| TranscodeError::io(&path, e))?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| TranscodeError::json(&path, e))?;
    if !value.is_object() {
        return Err(TranscodeError::MalformedManifest {
            path,
            reason: "top level is not an object".to_string(),
        });
    }
    Ok(value)
}
