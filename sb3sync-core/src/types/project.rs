//! The top-level project manifest (`project.json`)

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{Asset, Target};

/// A whole project manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Stage first, then sprites
    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default = "empty_array")]
    pub monitors: Value,

    #[serde(default = "empty_object")]
    pub extension_data: Value,

    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default, rename = "extensionURLs")]
    pub extension_urls: Map<String, Value>,

    #[serde(default)]
    pub custom_fonts: Vec<Asset>,

    #[serde(default = "default_meta")]
    pub meta: Value,
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_meta() -> Value {
    ProjectMeta::penguinmod()
}

impl Project {
    /// Empty project carrying the given `meta` (or the default runtime meta)
    pub fn new(meta: Option<Value>) -> Self {
        Self {
            targets: Vec::new(),
            monitors: empty_array(),
            extension_data: empty_object(),
            extensions: Vec::new(),
            extension_urls: Map::new(),
            custom_fonts: Vec::new(),
            meta: meta.unwrap_or_else(default_meta),
        }
    }

    pub fn stage(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.is_stage)
    }

    pub fn sprites(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|t| !t.is_stage)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Producing-runtime identities written into `meta`
pub struct ProjectMeta;

impl ProjectMeta {
    /// Default runtime identity
    pub fn penguinmod() -> Value {
        json!({
            "semver": "3.0.0",
            "vm": "0.2.0",
            "agent": "",
            "platform": {
                "name": "PenguinMod",
                "url": "https://penguinmod.com/",
                "version": "stable"
            }
        })
    }

    pub fn turbowarp() -> Value {
        json!({
            "semver": "3.0.0",
            "vm": "0.2.0",
            "agent": "",
            "platform": {
                "name": "TurboWarp",
                "url": "https://turbowarp.org/"
            }
        })
    }
}

/// Runtime a compiled archive is stamped for
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    PenguinMod,
    TurboWarp,
}

impl Platform {
    pub fn meta(&self) -> Value {
        match self {
            Platform::PenguinMod => ProjectMeta::penguinmod(),
            Platform::TurboWarp => ProjectMeta::turbowarp(),
        }
    }
}
