//! glTF/GLB mesh source
//!
//! Reads the first mesh (all triangle primitives merged) and, when it is
//! skinned, the skin's joints as a rest-pose skeleton. Coordinates are moved
//! from glTF's Y-up frame to the Z-up frame JFL files are authored in, and V
//! is flipped to a bottom-left UV origin. Animations are not sampled.

use anyhow::{bail, Context, Result};
use glam::{Mat4, Vec4};
use hashbrown::HashMap;
use std::path::Path;

use crate::model::{Bone, Matrix4, Mesh, Polygon, PolygonLoop, Skeleton, Vertex, VertexGroupWeight};
use crate::scene::{ObjectData, SceneObject, SceneSnapshot};

/// glTF (+Y up, -Z forward) to Z-up basis: (x, y, z) -> (x, -z, y)
const Y_UP_TO_Z_UP: Mat4 = Mat4::from_cols(Vec4::X, Vec4::Z, Vec4::NEG_Y, Vec4::W);

/// Load a glTF/GLB file as a scene snapshot
///
/// A skinned mesh comes back as an armature object (selected) with the mesh
/// as its child; an unskinned one as a lone selected mesh object.
pub fn load_gltf(input: &Path) -> Result<SceneSnapshot> {
    let (document, buffers, _images) =
        gltf::import(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;

    let mesh_node = document.nodes().find(|n| n.mesh().is_some());
    let gltf_mesh = match &mesh_node {
        Some(node) => node.mesh(),
        None => document.meshes().next(),
    }
    .context("No meshes found in glTF")?;

    let skin = mesh_node
        .as_ref()
        .and_then(|n| n.skin())
        .or_else(|| document.skins().next());
    let joint_names: Vec<String> = skin
        .as_ref()
        .map(|s| s.joints().map(|j| node_name(&j)).collect())
        .unwrap_or_default();

    let mut mesh = Mesh::default();

    for primitive in gltf_mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(
                "Skipping primitive {} with mode {:?} (only triangles are supported)",
                primitive.index(),
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        // Positions (required)
        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .context("No positions in mesh")?
            .collect();

        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|iter| iter.collect());
        let uvs: Option<Vec<[f32; 2]>> = reader
            .read_tex_coords(0)
            .map(|iter| iter.into_f32().collect());

        // Skinning data (optional) - JOINTS_0 and WEIGHTS_0
        let joints: Option<Vec<[u16; 4]>> =
            reader.read_joints(0).map(|iter| iter.into_u16().collect());
        let weights: Option<Vec<[f32; 4]>> =
            reader.read_weights(0).map(|iter| iter.into_f32().collect());

        let skinning = match (&joints, &weights) {
            (Some(j), Some(w)) if joint_names.is_empty() => {
                tracing::warn!(
                    "Primitive {} has {} skinned vertices but no skin, ignoring weights",
                    primitive.index(),
                    j.len().min(w.len())
                );
                None
            }
            (Some(j), Some(w)) if j.len() == positions.len() && w.len() == positions.len() => {
                Some((j.as_slice(), w.as_slice()))
            }
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "Primitive {} has partial skinning data, ignoring weights",
                    primitive.index()
                );
                None
            }
        };

        let base = mesh.vertices.len();
        for (i, position) in positions.iter().enumerate() {
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(i))
                .copied()
                .unwrap_or([0.0; 3]);
            let groups = match skinning {
                Some((j, w)) => vertex_groups(&j[i], &w[i], &joint_names)?,
                None => Vec::new(),
            };
            mesh.vertices.push(Vertex {
                position: y_up_to_z_up(*position),
                normal: y_up_to_z_up(normal),
                groups,
            });
        }

        // Indices (optional); unindexed primitives use vertex order
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|iter| iter.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());

        if indices.len() % 3 != 0 {
            tracing::warn!(
                "Primitive {} has {} indices, trailing {} ignored",
                primitive.index(),
                indices.len(),
                indices.len() % 3
            );
        }

        for tri in indices.chunks_exact(3) {
            let mut loops = Vec::with_capacity(3);
            for &index in tri {
                let index = index as usize;
                if index >= positions.len() {
                    bail!(
                        "Primitive {} index {} out of range ({} vertices)",
                        primitive.index(),
                        index,
                        positions.len()
                    );
                }
                let uv = uvs
                    .as_ref()
                    .and_then(|uvs| uvs.get(index))
                    .map(|uv| [uv[0], 1.0 - uv[1]])
                    .unwrap_or([0.0; 2]);
                loops.push(PolygonLoop {
                    vertex: (base + index) as u32,
                    uv,
                });
            }
            mesh.polygons.push(Polygon { loops });
        }
    }

    if mesh.vertices.is_empty() {
        bail!("No triangle primitives found in glTF mesh");
    }

    let animation_count = document.animations().count();
    if animation_count > 0 {
        tracing::warn!(
            "{} glTF animations are not sampled; export them from a scene snapshot instead",
            animation_count
        );
    }

    let mesh_name = mesh_node
        .as_ref()
        .and_then(|n| n.name())
        .or_else(|| gltf_mesh.name())
        .unwrap_or("Mesh")
        .to_string();

    let mesh_object = SceneObject {
        name: mesh_name.clone(),
        data: ObjectData::Mesh(mesh),
        children: Vec::new(),
    };

    let Some(skin) = skin else {
        return Ok(SceneSnapshot {
            selected: vec![mesh_name],
            objects: vec![mesh_object],
            actions: Vec::new(),
        });
    };

    let skeleton = skin_to_skeleton(&document, &skin, &joint_names)?;
    let mut rig_name = skin.name().unwrap_or("Armature").to_string();
    if rig_name == mesh_name {
        rig_name.push_str(".rig");
    }

    tracing::debug!(
        "glTF skin '{}': {} joints",
        rig_name,
        skeleton.bones.len()
    );

    Ok(SceneSnapshot {
        selected: vec![rig_name.clone()],
        objects: vec![
            SceneObject {
                name: rig_name,
                data: ObjectData::Armature(skeleton),
                children: vec![mesh_name],
            },
            mesh_object,
        ],
        actions: Vec::new(),
    })
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("joint_{}", node.index()))
}

fn vertex_groups(
    joints: &[u16; 4],
    weights: &[f32; 4],
    joint_names: &[String],
) -> Result<Vec<VertexGroupWeight>> {
    let mut groups = Vec::new();
    for (&joint, &weight) in joints.iter().zip(weights) {
        if weight <= 0.0 {
            continue;
        }
        let bone = joint_names.get(joint as usize).with_context(|| {
            format!(
                "Joint index {} out of range ({} joints in skin)",
                joint,
                joint_names.len()
            )
        })?;
        groups.push(VertexGroupWeight::new(bone.clone(), weight));
    }
    Ok(groups)
}

/// Rest-pose skeleton from a skin's joints, parents resolved to the nearest
/// ancestor that is itself a joint
///
/// World matrices are conjugated by the basis change, so an unrotated glTF
/// joint stays unrotated in Z-up space.
fn skin_to_skeleton(
    document: &gltf::Document,
    skin: &gltf::Skin,
    joint_names: &[String],
) -> Result<Skeleton> {
    let to_z_up = Y_UP_TO_Z_UP;
    let from_z_up = Y_UP_TO_Z_UP.transpose();

    let locals: Vec<Mat4> = document
        .nodes()
        .map(|n| Mat4::from_cols_array_2d(&n.transform().matrix()))
        .collect();

    let mut parents: HashMap<usize, usize> = HashMap::new();
    for node in document.nodes() {
        for child in node.children() {
            parents.insert(child.index(), node.index());
        }
    }

    let joint_name_by_node: HashMap<usize, &str> = skin
        .joints()
        .zip(joint_names)
        .map(|(j, name)| (j.index(), name.as_str()))
        .collect();

    let bones = skin
        .joints()
        .zip(joint_names)
        .map(|(joint, name)| {
            let chain = ancestors(joint.index(), &parents, locals.len())?;
            let world = to_z_up * compose(joint.index(), &chain, &locals) * from_z_up;
            let parent = chain
                .iter()
                .find_map(|p| joint_name_by_node.get(p))
                .map(|name| name.to_string());

            Ok(Bone {
                name: name.clone(),
                matrix: to_row_major(&world),
                parent,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Skeleton { bones })
}

/// Ancestors of node `index`, nearest first
///
/// A chain longer than the node count can only come from a cycle in the
/// `children` lists.
fn ancestors(index: usize, parents: &HashMap<usize, usize>, node_count: usize) -> Result<Vec<usize>> {
    let mut chain = Vec::new();
    let mut current = index;
    while let Some(&parent) = parents.get(&current) {
        if chain.len() >= node_count {
            bail!("glTF node hierarchy has a cycle above node {}", index);
        }
        chain.push(parent);
        current = parent;
    }
    Ok(chain)
}

/// World matrix of node `index` from its ancestor chain
fn compose(index: usize, chain: &[usize], locals: &[Mat4]) -> Mat4 {
    chain
        .iter()
        .fold(locals[index], |matrix, &parent| locals[parent] * matrix)
}

fn to_row_major(m: &Mat4) -> Matrix4 {
    m.transpose().to_cols_array()
}

fn y_up_to_z_up(v: [f32; 3]) -> [f32; 3] {
    [v[0], -v[2], v[1]]
}
