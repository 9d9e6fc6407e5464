use colored::Colorize;
use pulverize_render::{ChunkPlan, FrameRange, JobResult, ProjectInfo};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a run did, printed at the end and optionally saved as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub project: PathBuf,
    pub frames: FrameRange,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    /// Number of render workers; `None` when rendering was skipped.
    pub workers: Option<usize>,
    pub jobs: Vec<JobResult>,
    /// Joined output; `None` when concatenation was skipped.
    pub output: Option<PathBuf>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl RunSummary {
    pub fn new(project: &Path, info: &ProjectInfo, dry_run: bool) -> Self {
        Self {
            project: project.to_path_buf(),
            frames: info.frames,
            output_dir: info.output_dir.clone(),
            dry_run,
            workers: None,
            jobs: Vec::new(),
            output: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Sum of every worker's render time.
    pub fn worker_time(&self) -> Duration {
        self.jobs.iter().map(|job| job.elapsed).sum()
    }

    /// How much wall time the parallel render saved over a serial one.
    pub fn time_saved(&self) -> Duration {
        self.worker_time().saturating_sub(self.elapsed)
    }
}

pub(crate) fn print_header(text: &str) {
    println!();
    println!("{}", format!("# {}", text).cyan().bold());
    println!();
}

pub(crate) fn print_plan(project: &Path, info: &ProjectInfo, chunks: &ChunkPlan) {
    println!("{}", "Project:".bold());
    println!("  {} {}", "->".green(), project.display());
    println!(
        "  {} frames {} to {} ({} total)",
        "->".green(),
        info.frames.start(),
        info.frames.end(),
        info.frames.len()
    );
    println!("  {} output {}", "->".green(), info.output_dir.display());
    println!();

    println!("{} {} worker(s)", "Plan:".bold(), chunks.len());
    for (index, range) in chunks.iter().enumerate() {
        println!(
            "  {} chunk {}: frames {} ({} frames)",
            "->".green(),
            index,
            range,
            range.len()
        );
    }
}

pub(crate) fn print_summary(summary: &RunSummary) {
    print_header("All done!");

    if summary.dry_run {
        println!("{}", "(dry run: no render or ffmpeg processes were started)".dimmed());
    }

    for job in &summary.jobs {
        let status = if job.succeeded {
            "ok".green()
        } else {
            "!!".red()
        };
        println!(
            "  {} chunk {} frames {} in {}",
            status,
            job.index,
            job.range,
            format_duration(job.elapsed)
        );
    }

    if let Some(ref output) = summary.output {
        println!("{} {}", "Output:".bold(), output.display());
    }

    println!("Total time: {}", format_duration(summary.elapsed));
    if !summary.jobs.is_empty() {
        println!("Blender time: {}", format_duration(summary.worker_time()));
        println!(
            "{} {}",
            "Time saved:".green().bold(),
            format_duration(summary.time_saved())
        );
    }
}

/// Writes the summary as pretty JSON.
pub(crate) fn write_report(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}

/// `h:mm:ss`
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
