//! Error types for the export core

use std::io;

/// Errors that abort a single export attempt.
///
/// Nothing here is retried: every variant is terminal for the export that
/// produced it.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Nothing was selected in the scene snapshot
    #[error("no object selected")]
    NoSelection,

    /// The selected object (and its children) contain no mesh
    #[error("could not find a mesh on '{0}' or its children")]
    NoMesh(String),

    /// A selection or child reference names an object that doesn't exist
    #[error("object '{0}' not found in scene")]
    UnknownObject(String),

    /// Two bones share the same name
    #[error("duplicate bone name '{0}'")]
    DuplicateBone(String),

    /// A bone names a parent that is not part of the skeleton
    #[error("bone '{bone}' has unknown parent '{parent}'")]
    UnknownParent { bone: String, parent: String },

    /// The parent chain of a bone loops back on itself
    #[error("bone hierarchy cycle while resolving parent of '{0}'")]
    ParentCycle(String),

    /// An action frame has no matrix for one of the deform bones
    #[error("action '{clip}' frame {frame} has no matrix for bone '{bone}'")]
    MissingPose {
        clip: String,
        frame: i32,
        bone: String,
    },

    /// A polygon loop points past the end of the vertex list
    #[error("polygon {polygon} references vertex {vertex}, but mesh has {vertex_count} vertices")]
    InvalidVertexIndex {
        polygon: usize,
        vertex: u32,
        vertex_count: usize,
    },

    /// A polygon with fewer than three loops
    #[error("polygon {polygon} has {loops} loops, at least 3 are required")]
    DegeneratePolygon { polygon: usize, loops: usize },

    /// Opening, writing or renaming the output failed
    #[error(transparent)]
    Io(#[from] io::Error),
}
