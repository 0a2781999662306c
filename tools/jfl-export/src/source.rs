//! Source loading and single-file export

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::export::{self, ExportSummary};
use crate::scene::{load_snapshot, ObjectData, SceneObject, SceneSnapshot};
use crate::skeleton::BonePrefixes;

/// Load any supported source as a scene snapshot
///
/// `.json`/`.toml` are snapshots, `.obj` becomes a single selected mesh
/// object, `.gltf`/`.glb` go through the glTF loader.
pub fn load_scene(input: &Path) -> Result<SceneSnapshot> {
    // Detect format by extension
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" | "toml" => load_snapshot(input),
        "obj" => {
            let mesh = crate::mesh::load_obj(input)?;
            let name = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Mesh")
                .to_string();
            Ok(SceneSnapshot {
                selected: vec![name.clone()],
                objects: vec![SceneObject {
                    name,
                    data: ObjectData::Mesh(mesh),
                    children: Vec::new(),
                }],
                actions: Vec::new(),
            })
        }
        "gltf" | "glb" => crate::mesh::load_gltf(input),
        _ => bail!(
            "Unsupported source format: {:?} (use .json, .toml, .obj, .gltf, or .glb)",
            input
        ),
    }
}

/// Load, resolve and validate a source without writing anything
pub fn check_file(input: &Path, select: Option<&str>, prefixes: &BonePrefixes) -> Result<ExportSummary> {
    let scene = load_scene(input)?;
    let resolved = scene
        .resolve_selection(select)
        .with_context(|| format!("Failed to resolve selection in {:?}", input))?;
    let prepared = export::prepare(resolved.mesh, resolved.skeleton, resolved.clips, prefixes)
        .with_context(|| format!("Failed to prepare export of {:?}", input))?;
    Ok(prepared.summary())
}

/// Export one source file to a JFL file
pub fn export_file(
    input: &Path,
    output: &Path,
    select: Option<&str>,
    prefixes: &BonePrefixes,
) -> Result<ExportSummary> {
    let scene = load_scene(input)?;
    let resolved = scene
        .resolve_selection(select)
        .with_context(|| format!("Failed to resolve selection in {:?}", input))?;

    let summary = export::write_with_prefixes(
        output,
        resolved.mesh,
        resolved.skeleton,
        resolved.clips,
        prefixes,
    )
    .with_context(|| format!("Failed to export {:?} -> {:?}", input, output))?;

    tracing::info!(
        "Exported '{}': {} vertices, {} polygons, {} bones, {} actions ({} frames)",
        resolved.mesh_object,
        summary.vertices,
        summary.polygons,
        summary.bones,
        summary.clips,
        summary.frames
    );

    Ok(summary)
}
