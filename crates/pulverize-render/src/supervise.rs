//! Render supervision.
//!
//! One worker per planned chunk. Each worker is a scoped thread owning a single
//! renderer subprocess; all workers are started before any is awaited, and the
//! supervisor then waits for every one of them. A failed chunk never cancels
//! its siblings.
//!
//! Results come back ordered by chunk index regardless of completion order.

use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::concat::CHUNK_PREFIX;
use crate::config::PulverizeConfig;
use crate::error::{RenderError, RenderResult};
use crate::plan::{ChunkPlan, FrameRange};
use crate::tools;

/// Blender replaces the `#` run with the zero-padded frame numbers of the chunk.
pub const FRAME_TOKEN: &str = "#######";

/// Blender's per-frame progress line for movie output.
const APPEND_FRAME_PREFIX: &str = "Append frame ";

/// One chunk's render assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub index: usize,
    pub range: FrameRange,
    pub output_pattern: PathBuf,
}

impl RenderJob {
    pub fn new(index: usize, range: FrameRange, output_dir: &Path) -> Self {
        Self {
            index,
            range,
            output_pattern: output_dir.join(format!("{CHUNK_PREFIX}{FRAME_TOKEN}")),
        }
    }
}

/// Outcome of one chunk's render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub index: usize,
    pub range: FrameRange,
    pub exit_code: i32,
    pub succeeded: bool,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Frames a worker has finished, updated from the worker thread.
#[derive(Debug, Default)]
pub struct ChunkProgress {
    frames_done: AtomicU64,
}

impl ChunkProgress {
    /// Records that `frame` of `range` has been written.
    pub fn record_frame(&self, range: FrameRange, frame: i64) {
        if !range.contains(frame) {
            return;
        }
        let done = (frame - range.start()) as u64 + 1;
        self.frames_done.fetch_max(done, Ordering::Relaxed);
    }

    pub fn frames_done(&self) -> u64 {
        self.frames_done.load(Ordering::Relaxed)
    }
}

/// Renders one chunk to completion.
///
/// Implementations block until their render has finished and return its exit
/// code; zero means success.
pub trait ChunkRenderer: Sync {
    fn render(&self, project: &Path, job: &RenderJob, progress: &ChunkProgress)
        -> RenderResult<i32>;
}

/// Renders chunks with Blender in background mode.
#[derive(Debug, Clone)]
pub struct BlenderRenderer {
    blender: PathBuf,
    show_stderr: bool,
}

impl BlenderRenderer {
    pub fn new(blender: impl Into<PathBuf>) -> Self {
        Self {
            blender: blender.into(),
            show_stderr: false,
        }
    }

    /// Locates Blender through the usual discovery chain.
    pub fn from_config(config: &PulverizeConfig) -> RenderResult<Self> {
        Ok(Self::new(tools::find_blender(config)?).show_stderr(config.verbose))
    }

    /// Passes Blender's stderr through instead of discarding it.
    pub fn show_stderr(mut self, show: bool) -> Self {
        self.show_stderr = show;
        self
    }

    fn command(&self, project: &Path, job: &RenderJob) -> Command {
        // blender -b <project> -s <start> -e <end> -o <pattern> -a
        let mut cmd = Command::new(&self.blender);
        cmd.arg("-b")
            .arg(project)
            .arg("-s")
            .arg(job.range.start().to_string())
            .arg("-e")
            .arg(job.range.end().to_string())
            .arg("-o")
            .arg(&job.output_pattern)
            .arg("-a")
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        if self.show_stderr {
            cmd.stderr(Stdio::inherit());
        } else {
            cmd.stderr(Stdio::null());
        }
        cmd
    }
}

impl ChunkRenderer for BlenderRenderer {
    fn render(
        &self,
        project: &Path,
        job: &RenderJob,
        progress: &ChunkProgress,
    ) -> RenderResult<i32> {
        let mut cmd = self.command(project, job);
        tracing::debug!(chunk = job.index, command = ?cmd, "render command");

        let mut child = cmd
            .spawn()
            .map_err(|e| RenderError::spawn_failed(self.blender.display().to_string(), e))?;
        tracing::info!(
            chunk = job.index,
            pid = child.id(),
            "started render of frames {}",
            job.range
        );

        // Drain stdout so Blender never blocks on a full pipe.
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Some(frame) = parse_append_frame(&line) {
                    progress.record_frame(job.range, frame);
                }
            }
        }

        let status = child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Extracts the frame number from an `Append frame N` line.
pub fn parse_append_frame(line: &str) -> Option<i64> {
    let rest = line.trim_start().strip_prefix(APPEND_FRAME_PREFIX)?;
    rest.split_whitespace().next()?.parse().ok()
}

/// Runs one worker per planned chunk and collects their results.
pub struct Supervisor<'a> {
    renderer: &'a dyn ChunkRenderer,
    dry_run: bool,
    poll_interval: Duration,
}

impl<'a> Supervisor<'a> {
    pub fn new(renderer: &'a dyn ChunkRenderer, config: &PulverizeConfig) -> Self {
        Self {
            renderer,
            dry_run: config.dry_run,
            poll_interval: config.poll_interval,
        }
    }

    /// Renders every chunk of `plan` into `output_dir`.
    ///
    /// Blocks until all workers have exited. The returned results are indexed
    /// by chunk, not by completion order. In dry-run mode no renderer is
    /// invoked and every chunk reports success.
    pub fn supervise_all(
        &self,
        project: &Path,
        plan: &ChunkPlan,
        output_dir: &Path,
    ) -> Vec<JobResult> {
        let jobs: Vec<RenderJob> = plan
            .iter()
            .enumerate()
            .map(|(index, range)| RenderJob::new(index, *range, output_dir))
            .collect();

        if self.dry_run {
            return jobs
                .iter()
                .map(|job| {
                    tracing::info!(
                        chunk = job.index,
                        "dry run: would render frames {} to {}",
                        job.range,
                        job.output_pattern.display()
                    );
                    JobResult {
                        index: job.index,
                        range: job.range,
                        exit_code: 0,
                        succeeded: true,
                        elapsed: Duration::ZERO,
                    }
                })
                .collect();
        }

        let progress: Vec<ChunkProgress> = jobs.iter().map(|_| ChunkProgress::default()).collect();
        let total_frames = plan.total().len();
        let started = Instant::now();

        std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .iter()
                .zip(&progress)
                .map(|(job, progress)| {
                    scope.spawn(move || self.run_worker(project, job, progress))
                })
                .collect();

            let mut last_reported = None;
            while !handles.iter().all(|h| h.is_finished()) {
                std::thread::sleep(self.poll_interval);
                let done: u64 = progress.iter().map(ChunkProgress::frames_done).sum();
                if last_reported != Some(done) {
                    last_reported = Some(done);
                    report_progress(done, total_frames, started.elapsed());
                }
            }

            handles
                .into_iter()
                .zip(&jobs)
                .map(|(handle, job)| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::error!(chunk = job.index, "render worker panicked");
                        JobResult {
                            index: job.index,
                            range: job.range,
                            exit_code: -1,
                            succeeded: false,
                            elapsed: started.elapsed(),
                        }
                    })
                })
                .collect()
        })
    }

    fn run_worker(&self, project: &Path, job: &RenderJob, progress: &ChunkProgress) -> JobResult {
        let started = Instant::now();
        let exit_code = match self.renderer.render(project, job, progress) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(chunk = job.index, "render worker failed: {}", e);
                -1
            }
        };
        let elapsed = started.elapsed();

        if exit_code == 0 {
            tracing::info!(
                chunk = job.index,
                elapsed_secs = elapsed.as_secs_f64(),
                "finished frames {}",
                job.range
            );
        } else {
            tracing::error!(
                chunk = job.index,
                exit_code,
                "render of frames {} failed",
                job.range
            );
        }

        JobResult {
            index: job.index,
            range: job.range,
            exit_code,
            succeeded: exit_code == 0,
            elapsed,
        }
    }
}

fn report_progress(done: u64, total: u64, elapsed: Duration) {
    let percent = if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    };
    match estimate_remaining(done, total, elapsed) {
        Some(remaining) => tracing::info!(
            "progress: {} / {} frames, {:.2}%, elapsed {}s, remaining ~{}s",
            done,
            total,
            percent,
            elapsed.as_secs(),
            remaining.as_secs()
        ),
        None => tracing::info!(
            "progress: {} / {} frames, {:.2}%, elapsed {}s",
            done,
            total,
            percent,
            elapsed.as_secs()
        ),
    }
}

/// Linear extrapolation of the time left; `None` until a frame is done.
fn estimate_remaining(done: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if done == 0 || total == 0 {
        return None;
    }
    let left = total.saturating_sub(done);
    Some(elapsed.mul_f64(left as f64 / done as f64))
}

/// Indices of the chunks that did not render successfully.
pub fn failed_chunks(results: &[JobResult]) -> Vec<usize> {
    results
        .iter()
        .filter(|r| !r.succeeded)
        .map(|r| r.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl ChunkRenderer for CountingRenderer {
        fn render(&self, _: &Path, _: &RenderJob, _: &ChunkProgress) -> RenderResult<i32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    /// Finishes later chunks first and fails the chunks listed in `fail`.
    struct ReversedRenderer {
        chunks: usize,
        fail: Vec<usize>,
        completed: Mutex<Vec<usize>>,
    }

    impl ChunkRenderer for ReversedRenderer {
        fn render(&self, _: &Path, job: &RenderJob, progress: &ChunkProgress) -> RenderResult<i32> {
            std::thread::sleep(Duration::from_millis(
                40 * (self.chunks - job.index) as u64,
            ));
            progress.record_frame(job.range, job.range.end());
            self.completed.lock().unwrap().push(job.index);
            Ok(if self.fail.contains(&job.index) { 3 } else { 0 })
        }
    }

    fn test_config() -> PulverizeConfig {
        PulverizeConfig::new().poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_dry_run_never_renders() {
        let renderer = CountingRenderer {
            calls: AtomicUsize::new(0),
        };
        let config = test_config().dry_run(true);
        let plan = plan(FrameRange::new(1, 100).unwrap(), 4).unwrap();

        let results = Supervisor::new(&renderer, &config).supervise_all(
            Path::new("edit.blend"),
            &plan,
            Path::new("/tmp/out"),
        );

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.index, i);
            assert_eq!(result.range, plan.chunks()[i]);
            assert!(result.succeeded);
        }
    }

    #[test]
    fn test_results_ordered_by_index_not_completion() {
        let renderer = ReversedRenderer {
            chunks: 4,
            fail: vec![],
            completed: Mutex::new(Vec::new()),
        };
        let plan = plan(FrameRange::new(1, 100).unwrap(), 4).unwrap();

        let results = Supervisor::new(&renderer, &test_config()).supervise_all(
            Path::new("edit.blend"),
            &plan,
            Path::new("/tmp/out"),
        );

        assert_eq!(*renderer.completed.lock().unwrap(), vec![3, 2, 1, 0]);
        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(results.iter().all(|r| r.succeeded));
    }

    #[test]
    fn test_failure_does_not_cancel_siblings() {
        let renderer = ReversedRenderer {
            chunks: 4,
            fail: vec![2],
            completed: Mutex::new(Vec::new()),
        };
        let plan = plan(FrameRange::new(1, 100).unwrap(), 4).unwrap();

        let results = Supervisor::new(&renderer, &test_config()).supervise_all(
            Path::new("edit.blend"),
            &plan,
            Path::new("/tmp/out"),
        );

        assert_eq!(renderer.completed.lock().unwrap().len(), 4);
        assert_eq!(results[2].exit_code, 3);
        assert!(!results[2].succeeded);
        assert_eq!(failed_chunks(&results), vec![2]);
    }

    #[test]
    fn test_render_job_pattern() {
        let job = RenderJob::new(1, FrameRange::new(26, 50).unwrap(), Path::new("/tmp/out"));
        assert_eq!(
            job.output_pattern,
            PathBuf::from("/tmp/out/pulverize_frames_#######")
        );
    }

    #[test]
    fn test_blender_command_args() {
        let renderer = BlenderRenderer::new("blender");
        let job = RenderJob::new(0, FrameRange::new(1, 25).unwrap(), Path::new("/tmp/out"));
        let cmd = renderer.command(Path::new("edit.blend"), &job);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-b",
                "edit.blend",
                "-s",
                "1",
                "-e",
                "25",
                "-o",
                "/tmp/out/pulverize_frames_#######",
                "-a"
            ]
        );
    }

    #[test]
    fn test_parse_append_frame() {
        assert_eq!(parse_append_frame("Append frame 42"), Some(42));
        assert_eq!(parse_append_frame("Append frame 7 | Time: 00:00.12"), Some(7));
        assert_eq!(parse_append_frame("Fra:42 Mem:12.00M"), None);
        assert_eq!(parse_append_frame("Append frame x"), None);
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let range = FrameRange::new(10, 19).unwrap();
        let progress = ChunkProgress::default();
        progress.record_frame(range, 14);
        progress.record_frame(range, 12);
        assert_eq!(progress.frames_done(), 5);
        progress.record_frame(range, 99);
        assert_eq!(progress.frames_done(), 5);
        progress.record_frame(range, 19);
        assert_eq!(progress.frames_done(), 10);
    }

    #[test]
    fn test_estimate_remaining() {
        let elapsed = Duration::from_secs(30);
        assert_eq!(estimate_remaining(0, 100, elapsed), None);
        assert_eq!(
            estimate_remaining(25, 100, elapsed),
            Some(Duration::from_secs(90))
        );
        assert_eq!(estimate_remaining(100, 100, elapsed), Some(Duration::ZERO));
    }
}
