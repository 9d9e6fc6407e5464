//! Render command implementation
//!
//! Sequences the pipeline: inspect the project, plan and render the chunks
//! (unless concat-only), then join them (unless render-only). A failed chunk
//! stops the run before anything is concatenated.

use anyhow::{Context, Result};
use pulverize_render::{
    clean_intermediates, failed_chunks, inspect, plan, BlenderRenderer, ConcatDriver,
    PulverizeConfig, RenderError, RenderResult, Supervisor,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use super::reporting::{self, RunSummary};

/// Upper bound of the default worker count.
pub const MAX_DEFAULT_WORKERS: usize = 6;

/// What to run, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Blender project to render.
    pub project: PathBuf,
    /// Worker count; `None` uses [`default_worker_count`].
    pub workers: Option<i64>,
    /// Skip rendering, only join existing chunks.
    pub concat_only: bool,
    /// Render chunks but don't join them.
    pub render_only: bool,
    /// Remove chunk files and the manifest after joining.
    pub clean: bool,
    /// Write a JSON run summary here.
    pub report: Option<PathBuf>,
}

/// Half the logical CPUs, floored, between 1 and [`MAX_DEFAULT_WORKERS`].
///
/// Every worker is a full Blender process, so memory and disk contention grow
/// quickly with the worker count.
pub fn default_worker_count(cpus: usize) -> usize {
    (cpus / 2).clamp(1, MAX_DEFAULT_WORKERS)
}

/// Run the render command
///
/// # Returns
/// Exit code: 0 on success; errors are returned to `main`
pub fn run(options: &RunOptions, config: &PulverizeConfig) -> Result<ExitCode> {
    let summary = execute(options, config)?;

    reporting::print_summary(&summary);

    if let Some(ref path) = options.report {
        reporting::write_report(&summary, path)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

/// Runs the pipeline and returns what it did.
pub fn execute(options: &RunOptions, config: &PulverizeConfig) -> RenderResult<RunSummary> {
    let started = Instant::now();
    let project = options.project.as_path();

    if let Some(count) = options.workers.filter(|&n| n <= 0) {
        return Err(RenderError::InvalidWorkerCount { count });
    }

    let info = inspect::inspect(project, config)?;

    let workers = match options.workers {
        Some(n) => n,
        None => {
            let cpus = num_cpus::get();
            let n = default_worker_count(cpus);
            tracing::debug!(cpus, workers = n, "using default worker count");
            n as i64
        }
    };

    let mut summary = RunSummary::new(project, &info, config.dry_run);

    if !options.concat_only {
        let chunks = plan::plan(info.frames, workers)?;
        if (chunks.len() as i64) < workers {
            tracing::warn!(
                requested = workers,
                frames = info.frames.len(),
                "more workers than frames, using {} worker(s)",
                chunks.len()
            );
        }

        if !config.dry_run && !info.output_dir.is_dir() {
            return Err(RenderError::OutputDirNotADirectory {
                path: info.output_dir.clone(),
            });
        }

        reporting::print_plan(project, &info, &chunks);
        reporting::print_header("Step 1/2 Rendering with Blender");

        let renderer = BlenderRenderer::from_config(config)?;
        let results =
            Supervisor::new(&renderer, config).supervise_all(project, &chunks, &info.output_dir);

        summary.workers = Some(chunks.len());
        summary.jobs = results;

        let failed = failed_chunks(&summary.jobs);
        if !failed.is_empty() {
            return Err(RenderError::WorkerProcessFailed { failed });
        }
        tracing::info!("render processes complete");
    }

    if !options.render_only {
        reporting::print_header("Step 2/2 Concatenating videos with ffmpeg");
        let concat = ConcatDriver::new(config).concatenate(&info.output_dir, project)?;

        if options.clean && !config.dry_run {
            clean_intermediates(&concat)?;
        }
        summary.output = Some(concat.output_path);
    }

    summary.elapsed = started.elapsed();
    Ok(summary)
}
