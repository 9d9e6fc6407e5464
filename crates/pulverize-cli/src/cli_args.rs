//! CLI argument definitions for the pulverize command-line interface.

use clap::Parser;
use pulverize_render::PulverizeConfig;
use std::path::PathBuf;

use pulverize_cli::commands::RunOptions;

/// Pulverize - multi-process Blender VSE rendering
#[derive(Parser, Debug)]
#[command(name = "pulverize")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Blender project file to render
    pub project: PathBuf,

    /// Number of render workers (default: half the logical CPUs, at most 6)
    #[arg(short, long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Don't render new chunks, just concatenate existing ones
    #[arg(long, conflicts_with = "render_only")]
    pub concat_only: bool,

    /// Render chunks, but don't concatenate them
    #[arg(long)]
    pub render_only: bool,

    /// Do everything but the time-consuming render and ffmpeg processes
    #[arg(long)]
    pub dry_run: bool,

    /// Remove chunk files and the ffmpeg manifest after concatenating
    #[arg(long)]
    pub clean: bool,

    /// Write a JSON run summary to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Path to the Blender executable (default: BLENDER_PATH, then PATH)
    #[arg(long)]
    pub blender: Option<PathBuf>,

    /// Path to the ffmpeg executable (default: FFMPEG_PATH, then PATH)
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Debug logging; show Blender stderr and ffmpeg warnings
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            project: self.project.clone(),
            workers: self.workers,
            concat_only: self.concat_only,
            render_only: self.render_only,
            clean: self.clean,
            report: self.report.clone(),
        }
    }

    pub fn config(&self) -> PulverizeConfig {
        let mut config = PulverizeConfig::new()
            .dry_run(self.dry_run)
            .verbose(self.verbose);
        if let Some(ref path) = self.blender {
            config = config.blender_path(path);
        }
        if let Some(ref path) = self.ffmpeg {
            config = config.ffmpeg_path(path);
        }
        config
    }
}
