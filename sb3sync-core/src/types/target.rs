//! Targets (the stage and sprites) and their assets

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Which variant of target a record is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Stage,
    Sprite,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Stage => write!(f, "stage"),
            TargetKind::Sprite => write!(f, "sprite"),
        }
    }
}

/// A costume, sound or font record
///
/// `md5ext` is the content-derived file name: it names the blob in the
/// archive's flat pool and in a target's asset folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5ext: Option<String>,

    /// Format-specific fields (dataFormat, rotationCenterX, rate, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One stage or sprite record of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub is_stage: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stable identity; generated once when the source has none
    #[serde(default = "generate_id", deserialize_with = "id_or_generated")]
    pub id: String,

    #[serde(default)]
    pub costumes: Vec<Asset>,

    #[serde(default)]
    pub sounds: Vec<Asset>,

    /// Instruction graph, never parsed
    #[serde(default = "empty_object")]
    pub blocks: Value,

    /// Every other field (variables, lists, x, y, volume, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A `null` id counts as missing
fn id_or_generated<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(generate_id))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        if self.is_stage {
            TargetKind::Stage
        } else {
            TargetKind::Sprite
        }
    }

    /// Stage record populated with runtime defaults and a fresh id
    pub fn stage_skeleton() -> Self {
        let mut fields = shared_defaults();
        fields.insert("layerOrder".into(), json!(0));
        fields.insert("tempo".into(), json!(60));
        fields.insert("videoTransparency".into(), json!(50));
        fields.insert("videoState".into(), json!("on"));
        fields.insert("textToSpeechLanguage".into(), Value::Null);

        Self {
            is_stage: true,
            name: Some("Stage".to_string()),
            id: generate_id(),
            costumes: Vec::new(),
            sounds: Vec::new(),
            blocks: empty_object(),
            fields,
        }
    }

    /// Sprite record populated with runtime defaults and a fresh id
    pub fn sprite_skeleton(name: impl Into<String>) -> Self {
        let mut fields = shared_defaults();
        fields.insert("layerOrder".into(), json!(1));
        fields.insert("visible".into(), json!(true));
        fields.insert("x".into(), json!(0));
        fields.insert("y".into(), json!(0));
        fields.insert("size".into(), json!(100));
        fields.insert("direction".into(), json!(90));
        fields.insert("draggable".into(), json!(false));
        fields.insert("rotationStyle".into(), json!("all around"));

        Self {
            is_stage: false,
            name: Some(name.into()),
            id: generate_id(),
            costumes: Vec::new(),
            sounds: Vec::new(),
            blocks: empty_object(),
            fields,
        }
    }

    /// Layer order as an integer, if the record carries a numeric one
    pub fn layer_order(&self) -> Option<i64> {
        self.fields.get("layerOrder").and_then(|v| {
            v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
        })
    }
}

fn shared_defaults() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("variables".into(), json!({}));
    fields.insert("lists".into(), json!({}));
    fields.insert("broadcasts".into(), json!({}));
    fields.insert("customVars".into(), json!([]));
    fields.insert("comments".into(), json!({}));
    fields.insert("currentCostume".into(), json!(0));
    fields.insert("volume".into(), json!(100));
    fields.insert("extensionData".into(), json!({}));
    fields
}
