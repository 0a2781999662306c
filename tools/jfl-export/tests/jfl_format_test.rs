//! Format-level tests for jfl-export
//!
//! Writes models through the library and checks the text, either directly or
//! by reading it back with the JFL parser.

use std::collections::BTreeMap;

use jfl_export::model::IDENTITY;
use jfl_export::{
    parse_jfl, write_to, AnimationClip, Bone, BonePrefixes, FramePose, JflDocument, Matrix4, Mesh,
    Polygon, PolygonLoop, Skeleton, Vertex, VertexGroupWeight,
};

fn vertex(x: f32, y: f32, groups: &[(&str, f32)]) -> Vertex {
    Vertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, 1.0],
        groups: groups
            .iter()
            .map(|&(bone, weight)| VertexGroupWeight::new(bone, weight))
            .collect(),
    }
}

fn polygon(vertices: &[u32]) -> Polygon {
    Polygon {
        loops: vertices
            .iter()
            .map(|&vertex| PolygonLoop {
                vertex,
                uv: [vertex as f32 * 0.25, 0.5],
            })
            .collect(),
    }
}

/// Two triangles sharing an edge, plus a quad
fn strip_mesh() -> Mesh {
    Mesh {
        vertices: vec![
            vertex(0.0, 0.0, &[("DEF-arm", 1.0)]),
            vertex(1.0, 0.0, &[("DEF-arm", 0.01), ("DEF-hand", 0.99)]),
            vertex(1.0, 1.0, &[("DEF-hand", 0.0100001)]),
            vertex(0.0, 1.0, &[("DEF-arm", 0.5), ("DEF-hand", 0.5)]),
            vertex(2.0, 0.0, &[]),
            vertex(2.0, 1.0, &[]),
        ],
        polygons: vec![polygon(&[0, 1, 2]), polygon(&[0, 2, 3]), polygon(&[1, 4, 5, 2])],
    }
}

fn bone(name: &str, parent: Option<&str>) -> Bone {
    Bone {
        name: name.to_string(),
        matrix: IDENTITY,
        parent: parent.map(str::to_string),
    }
}

/// Control rig where deform bones hang off organizational bones
fn arm_rig() -> Skeleton {
    Skeleton {
        bones: vec![
            bone("root", None),
            bone("ORG-arm", Some("root")),
            bone("DEF-arm", Some("ORG-arm")),
            bone("MCH-hand_ik", Some("ORG-arm")),
            bone("DEF-hand", Some("MCH-hand_ik")),
        ],
    }
}

fn translation(x: f32) -> Matrix4 {
    let mut m = IDENTITY;
    m[3] = x;
    m
}

fn walk_clip(range: [f32; 2]) -> AnimationClip {
    AnimationClip {
        name: "Walk".into(),
        frame_range: range,
        frames: (0..8)
            .map(|frame| FramePose {
                frame,
                bones: BTreeMap::from([
                    ("root".to_string(), IDENTITY),
                    ("DEF-arm".to_string(), translation(frame as f32)),
                    ("DEF-hand".to_string(), translation(frame as f32 + 0.5)),
                ]),
            })
            .collect(),
    }
}

fn render(mesh: &Mesh, skeleton: Option<&Skeleton>, clips: &[AnimationClip]) -> String {
    let mut out = Vec::new();
    write_to(&mut out, mesh, skeleton, clips, &BonePrefixes::default())
        .expect("export should succeed");
    String::from_utf8(out).expect("output should be UTF-8")
}

fn reparse(text: &str) -> JflDocument {
    parse_jfl(text).expect("written JFL should parse")
}

#[test]
fn test_block_counts_match_mesh() {
    let mesh = strip_mesh();
    let text = render(&mesh, None, &[]);

    for i in 0..mesh.vertices.len() {
        assert!(text.contains(&format!("\n  Vert {}\n", i)), "missing Vert {}", i);
    }
    assert_eq!(text.matches("  Vert ").count(), 6);
    assert_eq!(text.matches("  Polygon index: ").count(), 3);
    assert!(text.contains("  Polygon index: 2, length: 4\n"));

    // All vertices precede all polygons
    let last_vert = text.rfind("  Vert ").unwrap();
    let first_poly = text.find("  Polygon index: ").unwrap();
    assert!(last_vert < first_poly);

    let doc = reparse(&text);
    assert_eq!(doc.mesh.vertices.len(), 6);
    assert_eq!(doc.mesh.polygons.len(), 3);
    assert_eq!(doc.mesh.loop_count(), 10);
}

#[test]
fn test_static_mesh_has_only_mesh_section() {
    let text = render(&strip_mesh(), None, &[walk_clip([1.0, 4.0])]);

    assert!(text.starts_with("Wolfire JamForLeelah Format\nVersion 1\n--BEGIN--\nMesh\n"));
    assert!(text.ends_with("  Vert 5\n    Coords: (2.000000, 1.000000, 0.000000)\n    Normals: (0.000000, 0.000000, 1.000000)\n    Vertex Groups:\n  Polygon index: 0, length: 3\n    Vertex: 0\n    UV: (0.000000, 0.500000)\n    Vertex: 1\n    UV: (0.250000, 0.500000)\n    Vertex: 2\n    UV: (0.500000, 0.500000)\n  Polygon index: 1, length: 3\n    Vertex: 0\n    UV: (0.000000, 0.500000)\n    Vertex: 2\n    UV: (0.500000, 0.500000)\n    Vertex: 3\n    UV: (0.750000, 0.500000)\n  Polygon index: 2, length: 4\n    Vertex: 1\n    UV: (0.250000, 0.500000)\n    Vertex: 4\n    UV: (1.000000, 0.500000)\n    Vertex: 5\n    UV: (1.250000, 0.500000)\n    Vertex: 2\n    UV: (0.500000, 0.500000)\n--END--\n"));
    assert!(!text.contains("Skeleton"));
    assert!(!text.contains("Action:"));
    // Group lines need a skeleton
    assert!(!text.contains("\"DEF-arm\""));
}

#[test]
fn test_group_weight_threshold() {
    let text = render(&strip_mesh(), Some(&arm_rig()), &[]);

    let vert1 = &text[text.find("  Vert 1\n").unwrap()..text.find("  Vert 2\n").unwrap()];
    assert!(!vert1.contains("\"DEF-arm\""), "weight 0.01 must be excluded");
    assert!(vert1.contains("      \"DEF-hand\", 0.990000\n"));

    let vert2 = &text[text.find("  Vert 2\n").unwrap()..text.find("  Vert 3\n").unwrap()];
    assert!(vert2.contains("      \"DEF-hand\", 0.010000\n"));

    let doc = reparse(&text);
    assert_eq!(doc.mesh.vertices[0].groups, vec![VertexGroupWeight::new("DEF-arm", 1.0)]);
    assert_eq!(doc.mesh.vertices[3].groups.len(), 2);
    assert!(doc.mesh.vertices[4].groups.is_empty());
}

#[test]
fn test_organizational_parent_is_substituted() {
    let text = render(&strip_mesh(), Some(&arm_rig()), &[]);
    assert!(text.contains("  Bone: DEF-hand\n"));
    assert!(text.contains("    Parent: \"DEF-arm\"\n"));

    let doc = reparse(&text);
    let skeleton = doc.skeleton.expect("skeleton block");
    let names: Vec<&str> = skeleton.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["DEF-arm", "DEF-hand"]);

    // DEF-arm's own ORG parent maps back to itself and is skipped
    assert_eq!(skeleton.bones[0].parent, None);
    assert_eq!(skeleton.bones[1].parent.as_deref(), Some("DEF-arm"));
}

#[test]
fn test_parents_name_written_bones() {
    let rig = Skeleton {
        bones: vec![
            bone("DEF-spine", None),
            bone("ORG-neck", Some("DEF-spine")),
            bone("DEF-neck", Some("ORG-neck")),
            bone("ORG-head", Some("ORG-neck")),
            bone("DEF-head", Some("ORG-head")),
            bone("ORG-jaw", Some("ORG-head")),
            bone("DEF-jaw", Some("ORG-jaw")),
            bone("MCH-eye", Some("DEF-head")),
        ],
    };
    let doc = reparse(&render(&strip_mesh(), Some(&rig), &[]));
    let skeleton = doc.skeleton.expect("skeleton block");

    for b in &skeleton.bones {
        if let Some(parent) = &b.parent {
            assert!(
                skeleton.bone(parent).is_some(),
                "{} has parent {} that is not written",
                b.name,
                parent
            );
        }
    }
    assert_eq!(skeleton.bone("DEF-neck").unwrap().parent.as_deref(), Some("DEF-spine"));
    assert_eq!(skeleton.bone("DEF-head").unwrap().parent.as_deref(), Some("DEF-neck"));
    assert_eq!(skeleton.bone("DEF-jaw").unwrap().parent.as_deref(), Some("DEF-head"));
}

#[test]
fn test_walk_clip_frames() {
    let text = render(&strip_mesh(), Some(&arm_rig()), &[walk_clip([1.0, 4.0])]);
    assert!(text.contains("Action: Walk\n  Frame: 1\n    Bone: DEF-arm\n      Matrix: (1.000000, 0.000000, 0.000000, 1.000000, "));

    let doc = reparse(&text);
    assert_eq!(doc.actions.len(), 1);
    let walk = &doc.actions[0];
    assert_eq!(walk.name, "Walk");

    let frames: Vec<i32> = walk.frames.iter().map(|f| f.frame).collect();
    assert_eq!(frames, vec![1, 2, 3]);
    for frame in &walk.frames {
        let bones: Vec<&str> = frame.bones.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(bones, vec!["DEF-arm", "DEF-hand"]);
        assert_eq!(frame.bones[1].1[3], frame.frame as f32 + 0.5);
    }
}

#[test]
fn test_frame_range_rounds_half_to_even() {
    // 0.5 -> 0 and 3.5 -> 4
    let doc = reparse(&render(&strip_mesh(), Some(&arm_rig()), &[walk_clip([0.5, 3.5])]));
    let frames: Vec<i32> = doc.actions[0].frames.iter().map(|f| f.frame).collect();
    assert_eq!(frames, vec![0, 1, 2, 3]);
}

#[test]
fn test_matrix_lines_hold_sixteen_values() {
    let mut rig = arm_rig();
    rig.bones[2].matrix = [0.0; 16];
    rig.bones[4].matrix = [
        -1.5, 2.25, 1e-7, 123456.0, //
        0.0, -0.0, 1.0, 2.0, //
        3.0, 4.0, 5.0, 6.0, //
        7.0, 8.0, 9.0, 10.0,
    ];
    let text = render(&strip_mesh(), Some(&rig), &[walk_clip([0.0, 2.0])]);

    let matrix_lines: Vec<&str> = text.lines().filter(|l| l.trim_start().starts_with("Matrix: ")).collect();
    // 2 rest matrices + 2 frames * 2 bones
    assert_eq!(matrix_lines.len(), 6);
    for line in &matrix_lines {
        assert_eq!(line.matches(", ").count(), 15, "{}", line);
        assert!(!line.contains('e'), "no exponent notation: {}", line);
    }
    assert!(text.contains("    Matrix: (0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000)\n"));
    assert!(text.contains("    Matrix: (-1.500000, 2.250000, 0.000000, 123456.000000, 0.000000, -0.000000, "));
}

#[test]
fn test_output_is_deterministic() {
    let mesh = strip_mesh();
    let rig = arm_rig();
    let clips = [walk_clip([1.0, 4.0]), walk_clip([0.0, 6.0])];
    assert_eq!(
        render(&mesh, Some(&rig), &clips),
        render(&mesh.clone(), Some(&rig.clone()), &clips.clone())
    );
}

#[test]
fn test_written_file_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arm.txt");

    let summary = jfl_export::write(&path, &strip_mesh(), Some(&arm_rig()), &[walk_clip([1.0, 4.0])])
        .expect("write should succeed");
    assert_eq!(summary.bones, 2);
    assert_eq!(summary.frames, 3);

    let doc = reparse(&std::fs::read_to_string(&path).unwrap());
    assert_eq!(doc.frame_count(), 3);
    assert_eq!(doc.mesh, {
        // Group lines at or below the threshold are not written, and weights
        // come back at six decimals
        let mut mesh = strip_mesh();
        mesh.vertices[1].groups.remove(0);
        mesh.vertices[2].groups[0].weight = 0.01;
        mesh
    });
}

#[test]
fn test_degenerate_polygon_is_rejected_before_writing() {
    let mut mesh = strip_mesh();
    mesh.polygons.push(polygon(&[0, 1]));

    let mut out = Vec::new();
    let err = write_to(&mut out, &mesh, None, &[], &BonePrefixes::default()).unwrap_err();
    assert!(matches!(
        err,
        jfl_export::ExportError::DegeneratePolygon { polygon: 3, loops: 2 }
    ));
    assert!(out.is_empty());
}
