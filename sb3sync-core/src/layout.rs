//! On-disk structured layout
//!
//! Names every file and directory of the structured representation and
//! provides the destructive reset and the project initializer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, TranscodeError};
use crate::path_utils::escape_target_name;
use crate::types::{ProjectConfig, CONFIG_FILE};

pub const MONITORS_FILE: &str = "monitors.json";
pub const EXTENSIONS_DIR: &str = "extensions";
pub const EXTENSIONS_FILE: &str = "extensions.json";
pub const EXTENSION_DATA_FILE: &str = "extension_data.json";
pub const FONTS_DIR: &str = "fonts";
pub const STAGE_DIR: &str = "stage";
pub const STAGE_META_FILE: &str = "stage_meta.json";
pub const SPRITES_DIR: &str = "sprites";
pub const SPRITE_META_FILE: &str = "sprite_meta.json";
pub const SOUNDS_DIR: &str = "sounds";
pub const COSTUMES_DIR: &str = "costumes";
pub const ASSET_CONFIG_FILE: &str = "config.json";
pub const SCRIPT_FILE: &str = "script.json";

/// Manifest file inside a packed archive
pub const MANIFEST_FILE: &str = "project.json";

/// Placeholder written for a declared extension with no known URL
pub const MISSING_URL_SENTINEL: &str = "URL not available in extensionURLs";

/// Subtrees the reset step may clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtree {
    Sprites,
    Extensions,
    Stage,
    Fonts,
}

impl Subtree {
    pub const ALL: [Subtree; 4] = [
        Subtree::Sprites,
        Subtree::Extensions,
        Subtree::Stage,
        Subtree::Fonts,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Subtree::Sprites => SPRITES_DIR,
            Subtree::Extensions => EXTENSIONS_DIR,
            Subtree::Stage => STAGE_DIR,
            Subtree::Fonts => FONTS_DIR,
        }
    }
}

/// Paths of a structured project rooted at `root`
#[derive(Debug, Clone)]
pub struct StructuredLayout {
    root: PathBuf,
}

impl StructuredLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn monitors_file(&self) -> PathBuf {
        self.root.join(MONITORS_FILE)
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.root.join(EXTENSIONS_DIR)
    }

    pub fn extensions_file(&self) -> PathBuf {
        self.extensions_dir().join(EXTENSIONS_FILE)
    }

    pub fn extension_data_file(&self) -> PathBuf {
        self.extensions_dir().join(EXTENSION_DATA_FILE)
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.root.join(FONTS_DIR)
    }

    pub fn stage_dir(&self) -> PathBuf {
        self.root.join(STAGE_DIR)
    }

    /// Stage costumes live directly in the stage directory
    pub fn stage_costumes_dir(&self) -> PathBuf {
        self.stage_dir()
    }

    pub fn sprites_dir(&self) -> PathBuf {
        self.root.join(SPRITES_DIR)
    }

    /// Directory for a sprite, from its display name
    pub fn sprite_dir(&self, name: &str) -> PathBuf {
        self.sprites_dir().join(escape_target_name(name))
    }
}

/// Remove everything inside each listed subtree of `root`
///
/// The subtree directories themselves and anything outside them are kept.
/// Missing subtrees are skipped.
pub fn reset_subtrees(root: &Path, subtrees: &[Subtree]) -> Result<()> {
    for subtree in subtrees {
        let dir = root.join(subtree.dir_name());
        if !dir.is_dir() {
            continue;
        }
        tracing::info!("Clearing {}", dir.display());
        for entry in fs::read_dir(&dir).map_err(|e| TranscodeError::io(&dir, e))? {
            let entry = entry.map_err(|e| TranscodeError::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| TranscodeError::io(&path, e))?;
            if file_type.is_dir() {
                fs::remove_dir_all(&path).map_err(|e| TranscodeError::io(&path, e))?;
            } else {
                fs::remove_file(&path).map_err(|e| TranscodeError::io(&path, e))?;
            }
        }
    }
    Ok(())
}

/// Create an empty structured project at `root`
///
/// Existing directories and an existing config are left alone.
pub fn init_structure(root: &Path) -> Result<()> {
    for dir in [root.join(SPRITES_DIR), root.join(STAGE_DIR).join(SOUNDS_DIR)] {
        if dir.exists() {
            tracing::info!("{} exists, skipping", dir.display());
            continue;
        }
        fs::create_dir_all(&dir).map_err(|e| TranscodeError::io(&dir, e))?;
    }

    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        let name = root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()));
        let config = ProjectConfig {
            name: name.unwrap_or_else(|| ProjectConfig::default().name),
            ..Default::default()
        };
        write_json(&config_path, &config)?;
    }
    Ok(())
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| TranscodeError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| TranscodeError::json(path, e))
}

/// Serialize `value` as pretty JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TranscodeError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| TranscodeError::json(path, e))?;
    fs::write(path, json).map_err(|e| TranscodeError::io(path, e))
}
