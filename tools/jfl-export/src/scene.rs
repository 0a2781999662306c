//! Scene snapshots and export selection
//!
//! A snapshot is the read-only stand-in for the host editor: its objects,
//! which of them are selected, and every action with pre-evaluated poses.
//! Snapshots are stored as JSON or TOML.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExportError;
use crate::model::{AnimationClip, Mesh, Skeleton};

/// Object payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectData {
    Mesh(Mesh),
    Armature(Skeleton),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub data: ObjectData,
    /// Names of child objects, in host order
    #[serde(default)]
    pub children: Vec<String>,
}

impl SceneObject {
    pub fn kind(&self) -> &'static str {
        match self.data {
            ObjectData::Mesh(_) => "mesh",
            ObjectData::Armature(_) => "armature",
            ObjectData::Empty => "empty",
        }
    }
}

/// Everything an export reads from the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    /// Selected object names; the first one is the export root
    #[serde(default)]
    pub selected: Vec<String>,
    /// Every action in the file, exported for rigged selections
    #[serde(default)]
    pub actions: Vec<AnimationClip>,
}

/// What a selection resolves to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportScene<'a> {
    /// Name of the object that provided the mesh
    pub mesh_object: &'a str,
    pub mesh: &'a Mesh,
    pub skeleton: Option<&'a Skeleton>,
    /// Empty unless there is a skeleton
    pub clips: &'a [AnimationClip],
}

impl SceneSnapshot {
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn object_or_err(&self, name: &str) -> Result<&SceneObject, ExportError> {
        self.object(name)
            .ok_or_else(|| ExportError::UnknownObject(name.to_string()))
    }

    /// Resolve the export root and the mesh to write
    ///
    /// `select` overrides the snapshot's own selection. A selected mesh is
    /// exported directly; otherwise the first mesh child is used. The skeleton
    /// and actions only come along when the root is an armature.
    pub fn resolve_selection(&self, select: Option<&str>) -> Result<ExportScene<'_>, ExportError> {
        let Some(root_name) = select.or(self.selected.first().map(String::as_str)) else {
            tracing::warn!("No objects selected");
            return Err(ExportError::NoSelection);
        };
        let root = self.object_or_err(root_name)?;

        let (mesh_object, mesh) = match &root.data {
            ObjectData::Mesh(mesh) => (root.name.as_str(), mesh),
            _ => {
                let mut found = None;
                for child_name in &root.children {
                    let child = self.object_or_err(child_name)?;
                    if let ObjectData::Mesh(mesh) = &child.data {
                        found = Some((child.name.as_str(), mesh));
                        break;
                    }
                }
                match found {
                    Some(found) => found,
                    None => {
                        tracing::warn!("Could not find mesh under '{}'", root.name);
                        return Err(ExportError::NoMesh(root.name.clone()));
                    }
                }
            }
        };

        let skeleton = match &root.data {
            ObjectData::Armature(skeleton) => Some(skeleton),
            _ => None,
        };
        let clips: &[AnimationClip] = if skeleton.is_some() {
            &self.actions
        } else {
            &[]
        };

        Ok(ExportScene {
            mesh_object,
            mesh,
            skeleton,
            clips,
        })
    }
}

/// Load a snapshot from `.json` or `.toml`
pub fn load_snapshot(path: &Path) -> Result<SceneSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene snapshot: {:?}", path))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let snapshot = match ext.as_str() {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scene snapshot: {:?}", path))?,
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Failed to parse scene snapshot: {:?}", path))?,
        _ => bail!("Unsupported snapshot format: {:?} (use .json or .toml)", path),
    };
    Ok(snapshot)
}
