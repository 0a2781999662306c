//! Action resolution (clip frame poses -> per-frame deform bone matrices)
//!
//! Poses arrive pre-evaluated; this module only decides which frames are
//! written and checks every one of them is complete before any output exists.

use hashbrown::HashMap;
use std::ops::Range;

use crate::error::ExportError;
use crate::model::{AnimationClip, FramePose, Matrix4};
use crate::skeleton::ResolvedBone;

/// Integer frames covered by a host frame range
///
/// Both ends are rounded half-to-even, the way the host rounds, and the end
/// is exclusive: `(1.0, 4.0)` yields frames 1, 2 and 3.
pub fn frame_range_to_frames(range: [f32; 2]) -> Range<i32> {
    let start = range[0].round_ties_even() as i32;
    let end = range[1].round_ties_even() as i32;
    start..end.max(start)
}

/// Bone matrices for one written frame, in deform bone order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFrame<'a> {
    pub frame: i32,
    pub bones: Vec<(&'a str, &'a Matrix4)>,
}

/// A clip ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClip<'a> {
    pub name: &'a str,
    pub frames: Vec<ResolvedFrame<'a>>,
}

/// Pick the frames of `clip` that fall in its rounded range
///
/// Every frame in range must carry a matrix for every deform bone.
pub fn resolve_clip<'a>(
    clip: &'a AnimationClip,
    bones: &[ResolvedBone<'a>],
) -> Result<ResolvedClip<'a>, ExportError> {
    let mut by_frame: HashMap<i32, &'a FramePose> = HashMap::with_capacity(clip.frames.len());
    for pose in &clip.frames {
        if by_frame.insert(pose.frame, pose).is_some() {
            tracing::warn!(
                "Action '{}' has more than one pose for frame {}, using the last",
                clip.name,
                pose.frame
            );
        }
    }

    let range = frame_range_to_frames(clip.frame_range);
    // The range may be far longer than the poses on hand
    let mut frames = Vec::with_capacity(range.len().min(clip.frames.len()));

    for frame in range.clone() {
        let missing = |bone: &str| ExportError::MissingPose {
            clip: clip.name.clone(),
            frame,
            bone: bone.to_string(),
        };

        let pose = by_frame.get(&frame).copied();
        let mut matrices = Vec::with_capacity(bones.len());
        for bone in bones {
            let matrix = pose
                .and_then(|p| p.bones.get(bone.name))
                .ok_or_else(|| missing(bone.name))?;
            matrices.push((bone.name, matrix));
        }

        frames.push(ResolvedFrame {
            frame,
            bones: matrices,
        });
    }

    let skipped = clip
        .frames
        .iter()
        .filter(|p| !range.contains(&p.frame))
        .count();
    if skipped > 0 {
        tracing::debug!(
            "Action '{}': {} poses outside frames {}..{} ignored",
            clip.name,
            skipped,
            range.start,
            range.end
        );
    }

    Ok(ResolvedClip {
        name: &clip.name,
        frames,
    })
}
