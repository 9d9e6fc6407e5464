//! Run configuration shared by the pipeline stages.

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between progress reports while waiting on workers.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Configuration for a pulverize run.
///
/// Passed explicitly to every stage; nothing in the pipeline reads global state
/// apart from the tool-discovery environment variables.
#[derive(Debug, Clone)]
pub struct PulverizeConfig {
    /// Path to the Blender executable.
    pub blender_path: Option<PathBuf>,
    /// Path to the ffmpeg executable.
    pub ffmpeg_path: Option<PathBuf>,
    /// Path to the inspection script run inside Blender.
    pub inspect_script: Option<PathBuf>,
    /// Skip render and concat subprocesses while keeping the control flow.
    pub dry_run: bool,
    /// Pass tool stderr through and let ffmpeg print warnings.
    pub verbose: bool,
    /// How often the supervisor reports render progress.
    pub poll_interval: Duration,
}

impl Default for PulverizeConfig {
    fn default() -> Self {
        Self {
            blender_path: None,
            ffmpeg_path: None,
            inspect_script: None,
            dry_run: false,
            verbose: false,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl PulverizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Blender executable path.
    pub fn blender_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.blender_path = Some(path.into());
        self
    }

    /// Sets the ffmpeg executable path.
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    /// Sets the inspection script path.
    pub fn inspect_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.inspect_script = Some(path.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the progress poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
