//! jfl-export - JFL mesh/skeleton/animation export tool
//!
//! Converts scene snapshots (JSON/TOML), OBJ and glTF sources to Wolfire
//! JamForLeelah (.txt) files

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Use modules from library
use jfl_export::formats::{parse_jfl, JFL_EXT};
use jfl_export::scene::ObjectData;
use jfl_export::{manifest, source, BonePrefixes};

#[derive(Parser)]
#[command(name = "jfl-export")]
#[command(about = "JFL mesh, skeleton and animation export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a single source file
    Export {
        /// Input scene snapshot (.json/.toml), OBJ, or glTF/GLB
        input: PathBuf,

        /// Output .txt file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Object to export (default: the source's selection)
        #[arg(short, long)]
        select: Option<String>,

        /// Prefix of deform bones
        #[arg(long, default_value = jfl_export::skeleton::DEFORM_PREFIX)]
        deform_prefix: String,

        /// Prefix of organizational bones
        #[arg(long, default_value = jfl_export::skeleton::ORGANIZATIONAL_PREFIX)]
        org_prefix: String,
    },

    /// Build exports from a manifest file
    Build {
        /// Path to jfl.toml manifest
        #[arg(default_value = "jfl.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate manifest without building
    Check {
        /// Path to jfl.toml manifest
        #[arg(default_value = "jfl.toml")]
        manifest: PathBuf,
    },

    /// List objects, selection and actions of a source
    List {
        /// Input scene snapshot, OBJ, or glTF/GLB
        input: PathBuf,
    },

    /// Read a JFL file and print a summary
    Inspect {
        /// Input .txt file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            output,
            select,
            deform_prefix,
            org_prefix,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(JFL_EXT));
            let prefixes = BonePrefixes {
                deform: deform_prefix,
                organizational: org_prefix,
            };
            tracing::info!("Exporting {:?} -> {:?}", input, output);
            source::export_file(&input, &output, select.as_deref(), &prefixes)?;
            tracing::info!("Done!");
        }

        Commands::Build {
            manifest,
            output,
            verbose,
        } => {
            if verbose {
                tracing::info!("Building exports from {:?}", manifest);
            }
            let config = manifest::load_manifest(&manifest)?;
            manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid!");
        }

        Commands::List { input } => {
            let scene = source::load_scene(&input)?;
            tracing::info!("{:?}: {} objects", input, scene.objects.len());
            for object in &scene.objects {
                let detail = match &object.data {
                    ObjectData::Mesh(mesh) => format!(
                        "{} vertices, {} polygons",
                        mesh.vertices.len(),
                        mesh.polygons.len()
                    ),
                    ObjectData::Armature(skeleton) => format!("{} bones", skeleton.bones.len()),
                    ObjectData::Empty => String::new(),
                };
                let selected = if scene.selected.contains(&object.name) {
                    " [selected]"
                } else {
                    ""
                };
                tracing::info!("  {} ({}) {}{}", object.name, object.kind(), detail, selected);
            }
            for action in &scene.actions {
                tracing::info!(
                    "  Action '{}': frames {}..{} ({} poses)",
                    action.name,
                    action.frame_range[0],
                    action.frame_range[1],
                    action.frames.len()
                );
            }
        }

        Commands::Inspect { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read JFL file: {:?}", input))?;
            let doc = parse_jfl(&text).with_context(|| format!("Invalid JFL file: {:?}", input))?;
            tracing::info!(
                "{:?}: {} vertices, {} polygons, {} loops",
                input,
                doc.mesh.vertices.len(),
                doc.mesh.polygons.len(),
                doc.mesh.loop_count()
            );
            match &doc.skeleton {
                Some(skeleton) => tracing::info!("  Skeleton: {} bones", skeleton.bones.len()),
                None => tracing::info!("  No skeleton"),
            }
            for action in &doc.actions {
                tracing::info!("  Action '{}': {} frames", action.name, action.frames.len());
            }
        }
    }

    Ok(())
}
