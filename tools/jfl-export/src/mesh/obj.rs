//! OBJ mesh source

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::model::{Mesh, Polygon, PolygonLoop, Vertex};

/// Load an OBJ file as an unrigged mesh
pub fn load_obj(input: &Path) -> Result<Mesh> {
    let file = File::open(input).with_context(|| format!("Failed to open OBJ: {:?}", input))?;
    let mesh = parse_obj(BufReader::new(file))
        .with_context(|| format!("Failed to parse OBJ: {:?}", input))?;

    tracing::debug!(
        "Loaded OBJ {:?}: {} vertices, {} polygons",
        input,
        mesh.vertices.len(),
        mesh.polygons.len()
    );
    Ok(mesh)
}

/// Parse OBJ text
///
/// Faces are kept as polygons, not triangulated. UVs are per face corner; a
/// vertex takes its normal from the first corner that supplies one.
pub fn parse_obj<R: BufRead>(reader: R) -> Result<Mesh> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals_raw: Vec<[f32; 3]> = Vec::new();

    let mut vertex_normals: Vec<Option<[f32; 3]>> = Vec::new();
    let mut polygons: Vec<Polygon> = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let line_num = line_num + 1;

        match parts[0] {
            "v" if parts.len() >= 4 => {
                positions.push(parse_floats(&parts[1..4], line_num)?);
                vertex_normals.push(None);
            }
            "vt" if parts.len() >= 3 => {
                tex_coords.push(parse_floats(&parts[1..3], line_num)?);
            }
            "vn" if parts.len() >= 4 => {
                normals_raw.push(parse_floats(&parts[1..4], line_num)?);
            }
            "f" => {
                if parts.len() < 4 {
                    tracing::warn!("OBJ line {}: face with fewer than 3 corners skipped", line_num);
                    continue;
                }

                let mut loops = Vec::with_capacity(parts.len() - 1);
                for corner in &parts[1..] {
                    let (vi, vti, vni) = parse_obj_vertex(
                        corner,
                        positions.len(),
                        tex_coords.len(),
                        normals_raw.len(),
                    )
                    .with_context(|| format!("line {}: invalid face corner '{}'", line_num, corner))?;

                    if let Some(ni) = vni {
                        vertex_normals[vi].get_or_insert(normals_raw[ni]);
                    }

                    loops.push(PolygonLoop {
                        vertex: vi as u32,
                        uv: vti.map(|ti| tex_coords[ti]).unwrap_or([0.0; 2]),
                    });
                }
                polygons.push(Polygon { loops });
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        bail!("No vertices found in OBJ file");
    }

    let vertices = positions
        .into_iter()
        .zip(vertex_normals)
        .map(|(position, normal)| Vertex {
            position,
            normal: normal.unwrap_or([0.0; 3]),
            groups: Vec::new(),
        })
        .collect();

    Ok(Mesh { vertices, polygons })
}

fn parse_floats<const N: usize>(parts: &[&str], line_num: usize) -> Result<[f32; N]> {
    let mut values = [0.0f32; N];
    for (value, part) in values.iter_mut().zip(parts) {
        *value = part
            .parse()
            .with_context(|| format!("line {}: invalid number '{}'", line_num, part))?;
    }
    Ok(values)
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
///
/// Indices are 1-based; negative indices count back from the latest element.
fn parse_obj_vertex(
    s: &str,
    position_count: usize,
    tex_coord_count: usize,
    normal_count: usize,
) -> Option<(usize, Option<usize>, Option<usize>)> {
    let parts: Vec<&str> = s.split('/').collect();

    let vi = resolve_obj_index(parts.first()?, position_count)?;

    let vti = match parts.get(1).filter(|s| !s.is_empty()) {
        Some(t) => Some(resolve_obj_index(t, tex_coord_count)?),
        None => None,
    };

    let vni = match parts.get(2).filter(|s| !s.is_empty()) {
        Some(n) => Some(resolve_obj_index(n, normal_count)?),
        None => None,
    };

    Some((vi, vti, vni))
}

fn resolve_obj_index(s: &str, count: usize) -> Option<usize> {
    let index: i64 = s.parse().ok()?;
    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        count as i64 + index
    } else {
        return None;
    };
    (0..count as i64)
        .contains(&resolved)
        .then_some(resolved as usize)
}
