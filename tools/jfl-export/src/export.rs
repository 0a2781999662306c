//! JFL export entry points
//!
//! Exports run in two steps: [`prepare`] validates the model and resolves
//! bones and frames, then the writer formats the result. Everything that can
//! fail for reasons other than I/O fails in the first step, before the output
//! file is touched.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::animation::{resolve_clip, ResolvedClip};
use crate::error::ExportError;
use crate::formats::write_jfl;
use crate::model::{AnimationClip, Mesh, Skeleton};
use crate::skeleton::{resolve_skeleton, BonePrefixes, ResolvedBone};

/// Skeleton and actions of a rigged export
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRig<'a> {
    pub bones: Vec<ResolvedBone<'a>>,
    pub clips: Vec<ResolvedClip<'a>>,
}

/// A validated model, ready to be formatted
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedExport<'a> {
    pub mesh: &'a Mesh,
    pub rig: Option<PreparedRig<'a>>,
}

impl PreparedExport<'_> {
    pub fn summary(&self) -> ExportSummary {
        let (bones, clips, frames) = match &self.rig {
            Some(rig) => (
                rig.bones.len(),
                rig.clips.len(),
                rig.clips.iter().map(|c| c.frames.len()).sum(),
            ),
            None => (0, 0, 0),
        };
        ExportSummary {
            vertices: self.mesh.vertices.len(),
            polygons: self.mesh.polygons.len(),
            bones,
            clips,
            frames,
        }
    }
}

/// Counts reported after an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub vertices: usize,
    pub polygons: usize,
    pub bones: usize,
    pub clips: usize,
    pub frames: usize,
}

/// Validate and resolve a model for writing
///
/// Clips are ignored when there is no skeleton.
pub fn prepare<'a>(
    mesh: &'a Mesh,
    skeleton: Option<&'a Skeleton>,
    clips: &'a [AnimationClip],
    prefixes: &BonePrefixes,
) -> Result<PreparedExport<'a>, ExportError> {
    mesh.validate()?;

    let rig = match skeleton {
        Some(skeleton) => {
            let bones = resolve_skeleton(skeleton, prefixes)?;
            let clips = clips
                .iter()
                .map(|clip| resolve_clip(clip, &bones))
                .collect::<Result<Vec<_>, _>>()?;
            Some(PreparedRig { bones, clips })
        }
        None => {
            if !clips.is_empty() {
                tracing::debug!("No skeleton, skipping {} actions", clips.len());
            }
            None
        }
    };

    Ok(PreparedExport { mesh, rig })
}

/// Write a mesh, optional skeleton and clips to `path` using the default
/// `DEF-`/`ORG-` bone prefixes
pub fn write(
    path: &Path,
    mesh: &Mesh,
    skeleton: Option<&Skeleton>,
    clips: &[AnimationClip],
) -> Result<ExportSummary, ExportError> {
    write_with_prefixes(path, mesh, skeleton, clips, &BonePrefixes::default())
}

/// [`write`] with explicit bone prefixes
pub fn write_with_prefixes(
    path: &Path,
    mesh: &Mesh,
    skeleton: Option<&Skeleton>,
    clips: &[AnimationClip],
    prefixes: &BonePrefixes,
) -> Result<ExportSummary, ExportError> {
    let prepared = prepare(mesh, skeleton, clips, prefixes)?;
    write_prepared(path, &prepared)?;
    Ok(prepared.summary())
}

/// Write a model to any writer
pub fn write_to<W: Write>(
    w: &mut W,
    mesh: &Mesh,
    skeleton: Option<&Skeleton>,
    clips: &[AnimationClip],
    prefixes: &BonePrefixes,
) -> Result<ExportSummary, ExportError> {
    let prepared = prepare(mesh, skeleton, clips, prefixes)?;
    write_jfl(w, &prepared)?;
    Ok(prepared.summary())
}

/// Write a prepared export to `path`
///
/// The document goes to a temporary file next to `path` that is renamed over
/// it once fully written. On failure the temporary file is removed and `path`
/// is left untouched. A replaced file keeps its permissions; a new one gets
/// 0644 on unix.
pub fn write_prepared(path: &Path, export: &PreparedExport) -> Result<(), ExportError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write_jfl(&mut writer, export)?;
        writer.flush()?;
    }

    // Temp files are created owner-only; fix the mode while `path` is intact
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = match std::fs::metadata(path) {
            Ok(existing) => existing.permissions(),
            Err(_) => std::fs::Permissions::from_mode(0o644),
        };
        file.as_file().set_permissions(permissions)?;
    }
    file.as_file().sync_all()?;

    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
