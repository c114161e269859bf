//! Read-only project summary
//!
//! Counts what a packed project contains without transcoding or writing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use zip::ZipArchive;

use crate::archive::{is_project_archive, read_manifest};
use crate::error::{Result, TranscodeError};
use crate::layout::MANIFEST_FILE;

/// Counts for one project manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub targets: usize,
    pub stages: usize,
    pub sprites: usize,
    pub costumes: usize,
    pub sounds: usize,
    pub extensions: usize,
    pub fonts: usize,
}

impl ProjectSummary {
    pub fn from_manifest(manifest: &Value) -> Self {
        let targets = manifest
            .get("targets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let count = |value: &Value, key: &str| {
            value.get(key).and_then(Value::as_array).map_or(0, Vec::len)
        };

        let stages = targets
            .iter()
            .filter(|t| t.get("isStage").and_then(Value::as_bool).unwrap_or(false))
            .count();

        Self {
            targets: targets.len(),
            stages,
            sprites: targets.len() - stages,
            costumes: targets.iter().map(|t| count(t, "costumes")).sum(),
            sounds: targets.iter().map(|t| count(t, "sounds")).sum(),
            extensions: count(manifest, "extensions"),
            fonts: count(manifest, "customFonts"),
        }
    }
}

/// Summarize a packed archive, an unpacked archive directory or a `project.json`
pub fn inspect(path: &Path) -> Result<ProjectSummary> {
    let manifest = if path.is_dir() {
        read_manifest(path)?
    } else if is_project_archive(path) {
        read_archive_manifest(path)?
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| TranscodeError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| TranscodeError::json(path, e))?
    };
    Ok(ProjectSummary::from_manifest(&manifest))
}

fn read_archive_manifest(path: &Path) -> Result<Value> {
    let file = File::open(path).map_err(|e| TranscodeError::io(path, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| TranscodeError::zip(path, e))?;
    let mut entry = archive
        .by_name(MANIFEST_FILE)
        .map_err(|e| TranscodeError::zip(path, e))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| TranscodeError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| TranscodeError::json(path, e))
}
