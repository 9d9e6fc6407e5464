//! Error types for the render pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for render pipeline operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while inspecting, rendering or concatenating a project.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Project file does not exist.
    #[error("Project file not found: {path}")]
    ProjectNotFound { path: PathBuf },

    /// Blender executable not found.
    #[error("Blender executable not found. Ensure Blender is installed and in PATH, or set BLENDER_PATH environment variable")]
    BlenderNotFound,

    /// ffmpeg executable not found.
    #[error("ffmpeg executable not found. Ensure ffmpeg is installed and in PATH, or set FFMPEG_PATH environment variable")]
    FfmpegNotFound,

    /// Failed to spawn an external tool.
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Blender exited non-zero while inspecting the project.
    #[error("Blender inspection exited with status {exit_code}: {stderr}")]
    InspectorProcessFailed { exit_code: i32, stderr: String },

    /// The inspection script output did not follow the line protocol.
    #[error("Malformed inspector output: {reason}")]
    MalformedInspectorOutput { reason: String },

    /// Frame range with start after end.
    #[error("Invalid frame range: start {start} is after end {end}")]
    InvalidFrameRange { start: i64, end: i64 },

    /// Worker count of zero or below.
    #[error("Invalid worker count {count}: at least one worker is required")]
    InvalidWorkerCount { count: i64 },

    /// The project's render output does not point at a directory.
    #[error("Render output is not a directory: {path}. Set the project's output to a directory and try again")]
    OutputDirNotADirectory { path: PathBuf },

    /// One or more chunk renders exited non-zero.
    #[error("Render failed for chunk(s) {}", format_indices(.failed))]
    WorkerProcessFailed { failed: Vec<usize> },

    /// No rendered chunks to concatenate.
    #[error("No rendered chunks found in {dir}. Check that the render worked")]
    NoChunksFound { dir: PathBuf },

    /// Failed to write the concat manifest.
    #[error("Failed to write concat manifest {path}: {source}")]
    WriteManifestFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ffmpeg exited non-zero.
    #[error("ffmpeg concatenation exited with status {exit_code}")]
    ConcatenationFailed { exit_code: i32 },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Creates a new malformed inspector output error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInspectorOutput {
            reason: reason.into(),
        }
    }

    /// Creates a new spawn failure for the given program.
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Stable identifier for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::ProjectNotFound { .. } => "PULVERIZE_001",
            RenderError::BlenderNotFound => "PULVERIZE_002",
            RenderError::FfmpegNotFound => "PULVERIZE_003",
            RenderError::SpawnFailed { .. } => "PULVERIZE_004",
            RenderError::InspectorProcessFailed { .. } => "PULVERIZE_005",
            RenderError::MalformedInspectorOutput { .. } => "PULVERIZE_006",
            RenderError::InvalidFrameRange { .. } => "PULVERIZE_007",
            RenderError::InvalidWorkerCount { .. } => "PULVERIZE_008",
            RenderError::OutputDirNotADirectory { .. } => "PULVERIZE_009",
            RenderError::WorkerProcessFailed { .. } => "PULVERIZE_010",
            RenderError::NoChunksFound { .. } => "PULVERIZE_011",
            RenderError::WriteManifestFailed { .. } => "PULVERIZE_012",
            RenderError::ConcatenationFailed { .. } => "PULVERIZE_013",
            RenderError::Io(_) => "PULVERIZE_014",
        }
    }
}

fn format_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
