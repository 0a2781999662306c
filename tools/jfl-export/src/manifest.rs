//! Manifest parsing and build orchestration
//!
//! Parses jfl.toml and exports every listed source. Relative paths in the
//! manifest are resolved against the manifest's own directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::formats::JFL_EXT;
use crate::skeleton::BonePrefixes;
use crate::source::{check_file, export_file};

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub bones: BonePrefixes,
    /// Keyed by export name; iterated in name order
    #[serde(default)]
    pub exports: BTreeMap<String, ExportEntry>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("assets/")
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExportEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        /// Object to export instead of the source's own selection
        #[serde(default)]
        select: Option<String>,
        /// Output file, instead of `<dir>/<name>.txt`
        #[serde(default)]
        output: Option<PathBuf>,
    },
}

impl ExportEntry {
    pub fn path(&self) -> &Path {
        match self {
            ExportEntry::Simple(p) => p,
            ExportEntry::Detailed { path, .. } => path,
        }
    }

    pub fn select(&self) -> Option<&str> {
        match self {
            ExportEntry::Simple(_) => None,
            ExportEntry::Detailed { select, .. } => select.as_deref(),
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match self {
            ExportEntry::Simple(_) => None,
            ExportEntry::Detailed { output, .. } => output.as_deref(),
        }
    }
}

impl Manifest {
    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Source file of an entry
    pub fn source_path(&self, entry: &ExportEntry) -> PathBuf {
        self.resolve(entry.path())
    }

    /// Destination of an entry, given the effective output directory
    pub fn output_path(&self, name: &str, entry: &ExportEntry, output_dir: &Path) -> PathBuf {
        match entry.output() {
            Some(output) => self.resolve(output),
            None => output_dir.join(format!("{}.{}", name, JFL_EXT)),
        }
    }
}

/// Parse manifest text; relative paths stay relative to the working directory
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let manifest: Manifest = toml::from_str(content)?;
    Ok(manifest)
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let mut manifest =
        parse_manifest(&content).with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

/// Validate a manifest without building
///
/// Every source must exist, load, and resolve to an exportable model.
pub fn validate(manifest: &Manifest) -> Result<()> {
    if manifest.exports.is_empty() {
        tracing::warn!("Manifest has no exports");
    }
    for (name, entry) in &manifest.exports {
        let source = manifest.source_path(entry);
        if !source.exists() {
            anyhow::bail!("Export '{}' source not found: {:?}", name, source);
        }
        let summary = check_file(&source, entry.select(), &manifest.bones)
            .with_context(|| format!("Export '{}' is invalid", name))?;
        tracing::debug!(
            "Export '{}' ok: {} vertices, {} bones, {} actions",
            name,
            summary.vertices,
            summary.bones,
            summary.clips
        );
    }
    Ok(())
}

/// Build all exports from a manifest
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<()> {
    let output_dir = match output_override {
        Some(dir) => dir.to_path_buf(),
        None => manifest.resolve(&manifest.output.dir),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    for (name, entry) in &manifest.exports {
        let source = manifest.source_path(entry);
        let output = manifest.output_path(name, entry, &output_dir);
        tracing::info!("Exporting: {} -> {:?}", name, output);

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }

        export_file(&source, &output, entry.select(), &manifest.bones)
            .with_context(|| format!("Export '{}' failed", name))?;
    }

    tracing::info!("Exported {} files to {:?}", manifest.exports.len(), output_dir);
    Ok(())
}
