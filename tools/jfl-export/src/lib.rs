//! jfl-export library
//!
//! Writes meshes, deform skeletons and baked actions as Wolfire JamForLeelah
//! (JFL) text files, and reads them back for inspection.

pub mod animation;
pub mod error;
pub mod export;
pub mod formats;
pub mod manifest;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod skeleton;
pub mod source;

pub use error::ExportError;

// Re-export the export entry points
pub use export::{prepare, write, write_to, write_with_prefixes, ExportSummary, PreparedExport};

// Re-export format reader/writer
pub use formats::{parse_jfl, write_jfl, JflDocument, ParseError, JFL_EXT};

// Re-export key data types
pub use model::{
    AnimationClip, Bone, FramePose, Matrix4, Mesh, Polygon, PolygonLoop, Skeleton, Vertex,
    VertexGroupWeight,
};
pub use scene::{ExportScene, SceneSnapshot};
pub use skeleton::BonePrefixes;
pub use source::{check_file, export_file, load_scene};
