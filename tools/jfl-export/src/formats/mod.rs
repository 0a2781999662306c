//! Wolfire JamForLeelah (JFL) text format
//!
//! Line-oriented UTF-8 text, `\n` line endings, two spaces of indentation per
//! nesting level:
//!
//! ```text
//! Wolfire JamForLeelah Format
//! Version 1
//! --BEGIN--
//! Mesh
//!   Vert 0
//!     Coords: (x, y, z)
//!     Normals: (x, y, z)
//!     Vertex Groups:
//!       "DEF-spine", 0.750000
//!   Polygon index: 0, length: 3
//!     Vertex: 0
//!     UV: (u, v)
//! Skeleton
//!   Bone: DEF-spine
//!     Matrix: (m00, m01, ..., m33)
//!     Parent: ""
//! Action: Walk
//!   Frame: 1
//!     Bone: DEF-spine
//!       Matrix: (...)
//! --END--
//! ```
//!
//! `Skeleton` and `Action` blocks only appear for rigged meshes. Floats are
//! always fixed-point with six decimals.

mod parse;

pub use parse::{parse_jfl, JflAction, JflDocument, JflFrame, ParseError, ParseErrorKind};

use std::io::{self, Write};

use crate::animation::ResolvedClip;
use crate::export::PreparedExport;
use crate::model::{Matrix4, Mesh};
use crate::skeleton::ResolvedBone;

/// First line of every JFL file
pub const JFL_MAGIC: &str = "Wolfire JamForLeelah Format";

/// Format version written on the second line
pub const JFL_VERSION: u32 = 1;

pub const JFL_BEGIN: &str = "--BEGIN--";
pub const JFL_END: &str = "--END--";

/// Conventional file extension
pub const JFL_EXT: &str = "txt";

/// Vertex group weights at or below this are not written
pub const MIN_GROUP_WEIGHT: f32 = 0.01;

/// Write a complete JFL document
pub fn write_jfl<W: Write>(w: &mut W, export: &PreparedExport) -> io::Result<()> {
    writeln!(w, "{}", JFL_MAGIC)?;
    writeln!(w, "Version {}", JFL_VERSION)?;
    writeln!(w, "{}", JFL_BEGIN)?;

    write_mesh(w, export.mesh, export.rig.is_some())?;

    if let Some(rig) = &export.rig {
        write_skeleton(w, &rig.bones)?;
        for clip in &rig.clips {
            write_action(w, clip)?;
        }
    }

    writeln!(w, "{}", JFL_END)
}

/// Write the `Mesh` block
///
/// Vertex group lines are only written when the mesh is exported with a
/// skeleton; the `Vertex Groups:` header is always present.
pub fn write_mesh<W: Write>(w: &mut W, mesh: &Mesh, with_groups: bool) -> io::Result<()> {
    writeln!(w, "Mesh")?;

    for (index, vert) in mesh.vertices.iter().enumerate() {
        writeln!(w, "  Vert {}", index)?;
        write!(w, "    Coords: ")?;
        write_float_tuple(w, &vert.position)?;
        write!(w, "    Normals: ")?;
        write_float_tuple(w, &vert.normal)?;
        writeln!(w, "    Vertex Groups:")?;
        if with_groups {
            for group in vert.groups.iter().filter(|g| g.weight > MIN_GROUP_WEIGHT) {
                write!(w, "      \"{}\", ", group.bone)?;
                write_float(w, group.weight)?;
                writeln!(w)?;
            }
        }
    }

    for (index, poly) in mesh.polygons.iter().enumerate() {
        writeln!(w, "  Polygon index: {}, length: {}", index, poly.loops.len())?;
        for l in &poly.loops {
            writeln!(w, "    Vertex: {}", l.vertex)?;
            write!(w, "    UV: ")?;
            write_float_tuple(w, &l.uv)?;
        }
    }

    Ok(())
}

/// Write the `Skeleton` block (rest pose)
pub fn write_skeleton<W: Write>(w: &mut W, bones: &[ResolvedBone]) -> io::Result<()> {
    writeln!(w, "Skeleton")?;
    for bone in bones {
        writeln!(w, "  Bone: {}", bone.name)?;
        write!(w, "    Matrix: ")?;
        write_float_tuple(w, bone.matrix)?;
        writeln!(w, "    Parent: \"{}\"", bone.parent.unwrap_or(""))?;
    }
    Ok(())
}

/// Write one `Action` block
pub fn write_action<W: Write>(w: &mut W, clip: &ResolvedClip) -> io::Result<()> {
    writeln!(w, "Action: {}", clip.name)?;
    for frame in &clip.frames {
        writeln!(w, "  Frame: {}", frame.frame)?;
        for (name, matrix) in &frame.bones {
            writeln!(w, "    Bone: {}", name)?;
            write!(w, "      Matrix: ")?;
            write_matrix(w, matrix)?;
        }
    }
    Ok(())
}

/// `(m00, m01, ..., m33)` followed by a newline
pub fn write_matrix<W: Write>(w: &mut W, matrix: &Matrix4) -> io::Result<()> {
    write_float_tuple(w, matrix)
}

/// `(a, b, ...)` followed by a newline
fn write_float_tuple<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    w.write_all(b"(")?;
    for (i, v) in values.iter().enumerate() {
        if i != 0 {
            w.write_all(b", ")?;
        }
        write_float(w, *v)?;
    }
    w.write_all(b")\n")
}

/// Six-decimal fixed point, never exponent notation
pub fn write_float<W: Write>(w: &mut W, value: f32) -> io::Result<()> {
    w.write_all(format_float(value).as_bytes())
}

/// Format like C's `%f`: six decimals, `nan`/`inf` for non-finite values
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:.6}", value as f64)
    }
}
