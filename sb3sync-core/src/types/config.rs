//! sb3sync project configuration
//!
//! Defines the optional `sb3sync.json` file at a structured root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Platform;
use crate::error::{Result, TranscodeError};

/// File name of the project configuration
pub const CONFIG_FILE: &str = "sb3sync.json";

/// Per-project settings used by the command line front end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name (display only)
    #[serde(default = "default_name")]
    pub name: String,

    /// Runtime identity stamped into compiled archives
    #[serde(default)]
    pub platform: Platform,

    /// Archive written by `fastcompile`, relative to the project root
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Reset the structured subtrees before every convert
    #[serde(default)]
    pub clear_on_convert: bool,
}

fn default_name() -> String {
    "Project".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("./project.sb3")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            platform: Platform::default(),
            output: default_output(),
            clear_on_convert: false,
        }
    }
}

impl ProjectConfig {
    /// Load `sb3sync.json` from `root`, falling back to defaults when absent
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| TranscodeError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| TranscodeError::json(&path, e))
    }
}
