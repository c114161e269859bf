//! Reassembler: structured directory tree -> packed archive
//!
//! Rebuilds `project.json` from the per-target files, gathers every asset
//! back into one flat build directory and zips it. Absent or unreadable
//! inputs fall back to defaults; only writing the archive can fail the run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::allowlist;
use crate::archive::pack;
use crate::assets::{copy_asset_files, AssetTally};
use crate::error::{Result, TranscodeError};
use crate::layout::{
    read_json, write_json, StructuredLayout, ASSET_CONFIG_FILE, COSTUMES_DIR, MANIFEST_FILE,
    SCRIPT_FILE, SOUNDS_DIR, SPRITE_META_FILE, STAGE_META_FILE,
};
use crate::path_utils::unescape_target_name;
use crate::types::{Asset, Project, Target};

/// Archive name used when the output path is a directory
pub const DEFAULT_ARCHIVE_NAME: &str = "project.sb3";

/// Summary of a reassembly run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassemblyReport {
    pub stage: bool,
    pub sprites: usize,
    pub extensions: usize,
    pub fonts: usize,
    pub assets: AssetTally,
    pub archive_path: PathBuf,
    pub archive_entries: usize,
}

/// Reassemble the structured tree at `structured_root` into a packed archive
///
/// `meta_override` replaces the default `meta` mapping entirely.
pub fn reassemble(
    structured_root: &Path,
    output: &Path,
    meta_override: Option<Value>,
) -> Result<ReassemblyReport> {
    let layout = StructuredLayout::new(structured_root);
    let mut project = Project::new(meta_override);
    let mut report = ReassemblyReport::default();

    let build = tempfile::Builder::new()
        .prefix("sb3sync-build-")
        .tempdir()
        .map_err(|e| TranscodeError::io(std::env::temp_dir(), e))?;
    let build_dir = build.path();

    tracing::info!("Reassembling {}", structured_root.display());

    load_extensions(&layout, &mut project);
    report.extensions = project.extensions.len();

    if let Some(monitors) = read_optional::<Value>(&layout.monitors_file()) {
        project.monitors = monitors;
    }

    let stage_dir = layout.stage_dir();
    if stage_dir.is_dir() {
        let (stage, tally) = load_target(
            Target::stage_skeleton(),
            &stage_dir,
            STAGE_META_FILE,
            &layout.stage_costumes_dir(),
            build_dir,
        );
        project.targets.push(stage);
        report.stage = true;
        report.assets.add(tally);
    } else {
        tracing::info!("No stage directory, skipping");
    }

    for (sprite, tally) in load_sprites(&layout, build_dir) {
        project.targets.push(sprite);
        report.sprites += 1;
        report.assets.add(tally);
    }

    let fonts_config = layout.fonts_dir().join(ASSET_CONFIG_FILE);
    if let Some(fonts) = read_optional::<Vec<Asset>>(&fonts_config) {
        report
            .assets
            .add(copy_asset_files(&fonts, &layout.fonts_dir(), build_dir));
        report.fonts = fonts.len();
        project.custom_fonts = fonts;
    }

    write_json(&build_dir.join(MANIFEST_FILE), &project)?;

    let archive_path = if output.is_dir() {
        output.join(DEFAULT_ARCHIVE_NAME)
    } else {
        output.to_path_buf()
    };
    report.archive_entries = pack(build_dir, &archive_path)?;
    report.archive_path = archive_path;

    tracing::info!(
        "Wrote {} ({} targets, {} entries)",
        report.archive_path.display(),
        project.targets.len(),
        report.archive_entries
    );

    Ok(report)
}

/// Read a JSON file if it exists; unreadable files are logged and ignored
fn read_optional<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.is_file() {
        tracing::debug!("{} not found, skipping", path.display());
        return None;
    }
    match read_json(path) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable file: {}", e);
            None
        }
    }
}

fn is_http_url(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"))
}

fn load_extensions(layout: &StructuredLayout, project: &mut Project) {
    if let Some(entries) = read_optional::<Map<String, Value>>(&layout.extensions_file()) {
        for (id, url) in entries {
            if is_http_url(&url) {
                project.extension_urls.insert(id.clone(), url);
            }
            project.extensions.push(id);
        }
        tracing::debug!(
            "Loaded {} extensions ({} with URLs)",
            project.extensions.len(),
            project.extension_urls.len()
        );
    }

    if let Some(data) = read_optional::<Value>(&layout.extension_data_file()) {
        project.extension_data = data;
    }
}

/// Every sprite directory, ordered by layer order then directory name
fn load_sprites(layout: &StructuredLayout, build_dir: &Path) -> Vec<(Target, AssetTally)> {
    let sprites_dir = layout.sprites_dir();
    let entries = match fs::read_dir(&sprites_dir) {
        Ok(entries) => entries,
        Err(_) => {
            tracing::info!("No sprites directory, skipping");
            return Vec::new();
        }
    };

    let mut dirs: Vec<(String, PathBuf)> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            Some((name, p))
        })
        .collect();
    dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sprites: Vec<(String, Target, AssetTally)> = dirs
        .into_iter()
        .map(|(dir_name, dir)| {
            let name = unescape_target_name(&dir_name);
            tracing::info!("Processing sprite '{}'", name);
            let (sprite, tally) = load_target(
                Target::sprite_skeleton(name),
                &dir,
                SPRITE_META_FILE,
                &dir.join(COSTUMES_DIR),
                build_dir,
            );
            (dir_name, sprite, tally)
        })
        .collect();

    sprites.sort_by(|a, b| {
        a.1.layer_order()
            .cmp(&b.1.layer_order())
            .then_with(|| a.0.cmp(&b.0))
    });

    sprites.into_iter().map(|(_, sprite, tally)| (sprite, tally)).collect()
}

/// Overlay metadata, asset manifests and scripts from `dir` onto a skeleton
fn load_target(
    mut target: Target,
    dir: &Path,
    meta_file: &str,
    costumes_dir: &Path,
    build_dir: &Path,
) -> (Target, AssetTally) {
    if let Some(meta) = read_optional::<Map<String, Value>>(&dir.join(meta_file)) {
        allowlist::apply(&mut target, meta);
    }

    let mut tally = AssetTally::default();

    let sounds_dir = dir.join(SOUNDS_DIR);
    if let Some(sounds) = read_optional::<Vec<Asset>>(&sounds_dir.join(ASSET_CONFIG_FILE)) {
        tally.add(copy_asset_files(&sounds, &sounds_dir, build_dir));
        target.sounds = sounds;
    }

    if let Some(costumes) = read_optional::<Vec<Asset>>(&costumes_dir.join(ASSET_CONFIG_FILE)) {
        tally.add(copy_asset_files(&costumes, costumes_dir, build_dir));
        target.costumes = costumes;
    }

    if let Some(blocks) = read_optional::<Value>(&dir.join(SCRIPT_FILE)) {
        target.blocks = blocks;
    }

    (target, tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{read_manifest, unpack};
    use crate::disassemble::{disassemble, DisassembleOptions};
    use crate::types::ProjectMeta;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Reassemble `root` and return the manifest plus the unpacked directory
    fn compile(root: &Path, work: &Path, meta: Option<Value>) -> (Value, PathBuf, ReassemblyReport) {
        let archive = work.join("out.sb3");
        let report = reassemble(root, &archive, meta).unwrap();
        let unpacked = work.join("unpacked");
        unpack(&archive, &unpacked).unwrap();
        (read_manifest(&unpacked).unwrap(), unpacked, report)
    }

    #[test]
    fn test_empty_tree_still_produces_archive() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("empty");
        fs::create_dir_all(&root).unwrap();

        let (manifest, _, report) = compile(&root, dir.path(), None);
        assert_eq!(manifest["targets"], json!([]));
        assert_eq!(manifest["monitors"], json!([]));
        assert_eq!(manifest["meta"], ProjectMeta::penguinmod());
        assert_eq!(report.archive_entries, 1);
    }

    #[test]
    fn test_meta_override_replaces_default() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir_all(&root).unwrap();

        let (manifest, _, _) = compile(&root, dir.path(), Some(ProjectMeta::turbowarp()));
        assert_eq!(manifest["meta"]["platform"]["name"], "TurboWarp");
        assert!(manifest["meta"]["platform"].get("version").is_none());
    }

    #[test]
    fn test_extension_url_filtering() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        write(
            &root.join("extensions/extensions.json"),
            r#"{"a": "http://x", "b": "not-a-url", "c": "URL not available in extensionURLs"}"#,
        );

        let (manifest, _, _) = compile(&root, dir.path(), None);
        assert_eq!(manifest["extensions"], json!(["a", "b", "c"]));
        assert_eq!(manifest["extensionURLs"], json!({"a": "http://x"}));
    }

    #[test]
    fn test_stage_defaults_overlaid_by_meta() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        write(&root.join("stage/stage_meta.json"), r#"{"id": "stage-id", "tempo": 120}"#);

        let (manifest, _, _) = compile(&root, dir.path(), None);
        let stage = &manifest["targets"][0];
        assert_eq!(stage["isStage"], true);
        assert_eq!(stage["name"], "Stage");
        assert_eq!(stage["id"], "stage-id");
        assert_eq!(stage["tempo"], 120);
        assert_eq!(stage["videoState"], "on");
        assert_eq!(stage["blocks"], json!({}));
    }

    #[test]
    fn test_malformed_meta_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        write(&root.join("sprites/Cat/sprite_meta.json"), "{ broken");

        let (manifest, _, _) = compile(&root, dir.path(), None);
        let cat = &manifest["targets"][0];
        assert_eq!(cat["name"], "Cat");
        assert_eq!(cat["x"], 0);
        assert!(cat["id"].as_str().is_some());
    }

    #[test]
    fn test_sprite_order_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        write(&root.join("sprites/Zebra/sprite_meta.json"), r#"{"layerOrder": 1}"#);
        write(&root.join("sprites/Apple/sprite_meta.json"), r#"{"layerOrder": 2}"#);
        write(&root.join("sprites/Mango/sprite_meta.json"), r#"{"layerOrder": 1}"#);
        write(&root.join("stage/stage_meta.json"), "{}");

        let (manifest, _, _) = compile(&root, dir.path(), None);
        let names: Vec<_> = manifest["targets"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Stage", "Mango", "Zebra", "Apple"]);
    }

    #[test]
    fn test_assets_fan_in_to_flat_pool() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        write(&root.join("stage/config.json"), r#"[{"assetId": "bg", "md5ext": "bg.svg"}]"#);
        write(&root.join("stage/bg.svg"), "<svg/>");
        write(
            &root.join("sprites/Cat/costumes/config.json"),
            r#"[{"assetId": "c", "md5ext": "abc123.png"}, {"assetId": "g", "md5ext": "ghost.png"}]"#,
        );
        write(&root.join("sprites/Cat/costumes/abc123.png"), "png");
        write(&root.join("sprites/Cat/sounds/config.json"), r#"[{"assetId": "m", "md5ext": "meow.wav"}]"#);
        write(&root.join("sprites/Cat/sounds/meow.wav"), "wav");

        let (manifest, unpacked, report) = compile(&root, dir.path(), None);
        assert!(unpacked.join("bg.svg").is_file());
        assert!(unpacked.join("abc123.png").is_file());
        assert!(unpacked.join("meow.wav").is_file());
        assert!(!unpacked.join("ghost.png").exists());
        assert_eq!(report.assets.copied, 3);
        assert_eq!(report.assets.missing, 1);
        assert_eq!(manifest["targets"][1]["costumes"][1]["md5ext"], "ghost.png");
    }

    #[test]
    fn test_fonts_loaded() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        write(&root.join("fonts/config.json"), r#"[{"family": "Comic", "md5ext": "font.ttf"}]"#);
        write(&root.join("fonts/font.ttf"), "ttf");

        let (manifest, unpacked, report) = compile(&root, dir.path(), None);
        assert_eq!(report.fonts, 1);
        assert_eq!(manifest["customFonts"][0]["family"], "Comic");
        assert!(unpacked.join("font.ttf").is_file());
    }

    #[test]
    fn test_output_directory_gets_default_name() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir_all(&root).unwrap();

        let report = reassemble(&root, &root, None).unwrap();
        assert_eq!(report.archive_path, root.join(DEFAULT_ARCHIVE_NAME));
        assert!(report.archive_path.is_file());
    }

    fn round_trip_manifest() -> Value {
        json!({
            "targets": [
                {
                    "isStage": true,
                    "name": "Stage",
                    "id": "stage-id",
                    "variables": {"v1": ["score", 0]},
                    "lists": {},
                    "broadcasts": {"b1": "go"},
                    "customVars": [],
                    "blocks": {},
                    "comments": {},
                    "currentCostume": 0,
                    "costumes": [{"assetId": "bg", "md5ext": "bg.svg", "dataFormat": "svg"}],
                    "sounds": [],
                    "volume": 100,
                    "layerOrder": 0,
                    "tempo": 60,
                    "videoTransparency": 50,
                    "videoState": "on",
                    "textToSpeechLanguage": null,
                    "extensionData": {}
                },
                {
                    "isStage": false,
                    "name": "Player/2",
                    "id": "player-id",
                    "variables": {},
                    "lists": {},
                    "broadcasts": {},
                    "customVars": [],
                    "blocks": {"b1": {"opcode": "motion_movesteps", "inputs": {"STEPS": [1, [4, "10"]]}}},
                    "comments": {},
                    "currentCostume": 0,
                    "costumes": [{"assetId": "cat", "md5ext": "abc123.png", "dataFormat": "png"}],
                    "sounds": [{"assetId": "meow", "md5ext": "meow.wav", "rate": 48000}],
                    "volume": 100,
                    "layerOrder": 1,
                    "visible": true,
                    "x": 36,
                    "y": 28,
                    "size": 100,
                    "direction": 90,
                    "draggable": false,
                    "rotationStyle": "all around",
                    "extensionData": {},
                    "notAllowlisted": 1
                },
                {
                    "isStage": false,
                    "name": "snake_case",
                    "id": "snake-id",
                    "layerOrder": 2,
                    "costumes": [],
                    "sounds": [],
                    "blocks": {}
                }
            ],
            "monitors": [{"id": "m1", "opcode": "data_variable", "visible": true}],
            "extensions": ["pen"],
            "extensionURLs": {},
            "extensionData": {},
            "customFonts": [],
            "meta": {"semver": "3.0.0"}
        })
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        let original = round_trip_manifest();
        fs::write(source.join("project.json"), original.to_string()).unwrap();
        for file in ["bg.svg", "abc123.png", "meow.wav"] {
            fs::write(source.join(file), file).unwrap();
        }

        let root = dir.path().join("structured");
        disassemble(&root, &source, &DisassembleOptions::default()).unwrap();
        assert!(root.join("sprites/Player%2F2/costumes/abc123.png").is_file());

        let (manifest, unpacked, _) = compile(&root, dir.path(), Some(json!({"semver": "3.0.0"})));

        let targets = manifest["targets"].as_array().unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0], original["targets"][0]);

        let mut expected_player = original["targets"][1].clone();
        expected_player.as_object_mut().unwrap().remove("notAllowlisted");
        assert_eq!(targets[1], expected_player);

        assert_eq!(targets[2]["name"], "snake_case");
        assert_eq!(targets[2]["id"], "snake-id");

        assert_eq!(manifest["monitors"], original["monitors"]);
        assert_eq!(manifest["extensions"], json!(["pen"]));
        assert_eq!(manifest["meta"], original["meta"]);
        for file in ["bg.svg", "abc123.png", "meow.wav"] {
            assert_eq!(fs::read_to_string(unpacked.join(file)).unwrap(), file);
        }
    }

    #[test]
    fn test_identity_stable_across_repeated_round_trips() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        fs::write(
            source.join("project.json"),
            json!({"targets": [{"isStage": false, "name": "Cat"}]}).to_string(),
        )
        .unwrap();

        let root = dir.path().join("structured");
        disassemble(&root, &source, &DisassembleOptions::default()).unwrap();
        let (first, _, _) = compile(&root, &dir.path().join("one"), None);
        let (second, _, _) = compile(&root, &dir.path().join("two"), None);
        assert_eq!(first["targets"][0]["id"], second["targets"][0]["id"]);
    }
}
