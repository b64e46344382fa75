//! Scene document I/O.
//!
//! A scene travels as one JSON file: the collection tree, objects with
//! their meshes, commands, and the spec registry. Saves go through a
//! sibling temp file and an atomic rename so a failed write never
//! truncates the original.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use relmesh_scene::Scene;

pub fn load_scene(path: &Path) -> Result<Scene> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read scene file: {}", path.display()))?;
    let scene: Scene = serde_json::from_str(&text)
        .with_context(|| format!("parse scene file: {}", path.display()))?;
    debug!(path = %path.display(), "scene loaded");
    Ok(scene)
}

pub fn save_scene(scene: &Scene, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(scene).context("serialize scene")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text).with_context(|| format!("write scene file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("replace scene file: {}", path.display()))?;
    debug!(path = %path.display(), "scene saved");
    Ok(())
}
