//! Metadata allowlist
//!
//! The fixed set of target fields written to `stage_meta.json` /
//! `sprite_meta.json` and read back from them. Both directions go through
//! these tables; a field missing here does not survive a round trip.

use serde_json::{Map, Value};

use crate::types::{Target, TargetKind};

/// Bumped whenever a table changes
pub const ALLOWLIST_VERSION: u32 = 1;

pub const STAGE_FIELDS: &[&str] = &[
    "id",
    "comments",
    "currentCostume",
    "variables",
    "lists",
    "broadcasts",
    "customVars",
    "volume",
    "layerOrder",
    "tempo",
    "videoTransparency",
    "videoState",
    "textToSpeechLanguage",
    "extensionData",
];

pub const SPRITE_FIELDS: &[&str] = &[
    "id",
    "comments",
    "currentCostume",
    "variables",
    "lists",
    "broadcasts",
    "customVars",
    "volume",
    "layerOrder",
    "visible",
    "x",
    "y",
    "size",
    "direction",
    "draggable",
    "rotationStyle",
    "extensionData",
];

pub fn fields_for(kind: TargetKind) -> &'static [&'static str] {
    match kind {
        TargetKind::Stage => STAGE_FIELDS,
        TargetKind::Sprite => SPRITE_FIELDS,
    }
}

pub fn is_allowed(kind: TargetKind, key: &str) -> bool {
    fields_for(kind).contains(&key)
}

/// Allowlisted fields present on `target`
pub fn select(target: &Target) -> Map<String, Value> {
    let kind = target.kind();
    let mut meta = Map::new();
    for &key in fields_for(kind) {
        if key == "id" {
            meta.insert(key.to_string(), Value::String(target.id.clone()));
        } else if let Some(value) = target.fields.get(key) {
            meta.insert(key.to_string(), value.clone());
        }
    }
    meta
}

/// Overlay metadata onto `target`, ignoring anything not allowlisted
pub fn apply(target: &mut Target, meta: Map<String, Value>) {
    let kind = target.kind();
    for (key, value) in meta {
        if !is_allowed(kind, &key) {
            tracing::debug!("Ignoring non-allowlisted {} field '{}'", kind, key);
            continue;
        }
        if key == "id" {
            match value {
                Value::String(id) => target.id = id,
                other => tracing::warn!("Ignoring non-string {} id: {}", kind, other),
            }
            continue;
        }
        target.fields.insert(key, value);
    }
}
