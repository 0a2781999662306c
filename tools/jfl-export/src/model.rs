//! In-memory scene model consumed by the JFL writer
//!
//! Everything here is plain data: positions, normals and matrices are already
//! evaluated by whatever produced the snapshot. Nothing in this crate computes
//! poses or interpolates animation curves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ExportError;

/// 4×4 transform flattened in row-major order (`m[row * 4 + col]`)
pub type Matrix4 = [f32; 16];

/// Row-major identity matrix
pub const IDENTITY: Matrix4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// A single (bone name, weight) skinning influence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexGroupWeight {
    pub bone: String,
    pub weight: f32,
}

impl VertexGroupWeight {
    pub fn new(bone: impl Into<String>, weight: f32) -> Self {
        Self {
            bone: bone.into(),
            weight,
        }
    }
}

/// Mesh vertex. Its index is its position in [`Mesh::vertices`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Skinning influences in host order; weights need not sum to 1
    #[serde(default)]
    pub groups: Vec<VertexGroupWeight>,
}

/// One corner of a polygon.
///
/// UVs live on loops rather than vertices because a vertex shared by two faces
/// can sit on a UV seam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonLoop {
    pub vertex: u32,
    #[serde(default)]
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub loops: Vec<PolygonLoop>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
}

impl Mesh {
    /// Total number of polygon loops
    pub fn loop_count(&self) -> usize {
        self.polygons.iter().map(|p| p.loops.len()).sum()
    }

    /// Check that every polygon has at least three loops and every loop
    /// references an existing vertex
    pub fn validate(&self) -> Result<(), ExportError> {
        let vertex_count = self.vertices.len();
        for (polygon, poly) in self.polygons.iter().enumerate() {
            if poly.loops.len() < 3 {
                return Err(ExportError::DegeneratePolygon {
                    polygon,
                    loops: poly.loops.len(),
                });
            }
            if let Some(bad) = poly
                .loops
                .iter()
                .find(|l| l.vertex as usize >= vertex_count)
            {
                return Err(ExportError::InvalidVertexIndex {
                    polygon,
                    vertex: bad.vertex,
                    vertex_count,
                });
            }
        }
        Ok(())
    }
}

/// Pose bone with its world-space matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub matrix: Matrix4,
    /// Parent bone name; `None` for roots
    #[serde(default)]
    pub parent: Option<String>,
}

/// Pose-bone hierarchy in host traversal order, evaluated at rest pose
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }
}

/// World matrices for every bone at one integer frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePose {
    pub frame: i32,
    pub bones: BTreeMap<String, Matrix4>,
}

/// Named animation clip with pre-evaluated per-frame poses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Host frame range; rounded before iterating `[start, end)`
    pub frame_range: [f32; 2],
    #[serde(default)]
    pub frames: Vec<FramePose>,
}
