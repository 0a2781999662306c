//! Mesh sources (glTF/OBJ -> scene data)

mod gltf;
mod obj;

// Re-export public API
pub use gltf::load_gltf;
pub use obj::{load_obj, parse_obj};
