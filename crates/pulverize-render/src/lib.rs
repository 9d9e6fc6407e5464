//! Pulverize render core
//!
//! Multi-process rendering for Blender video sequence editor projects. A
//! single Blender render only keeps one core busy, so the project's frame range
//! is split into contiguous chunks, each chunk is rendered by its own Blender
//! process, and the resulting movie files are joined losslessly by ffmpeg.
//!
//! # Pipeline
//!
//! 1. [`inspect`] - run Blender once to read the frame range and output directory
//! 2. [`plan`] - split the frame range into one chunk per worker
//! 3. [`supervise`] - render all chunks concurrently, one subprocess each
//! 4. [`concat`] - join the chunk files in frame order
//!
//! ```ignore
//! use pulverize_render::{inspect, plan, BlenderRenderer, ConcatDriver, PulverizeConfig, Supervisor};
//! use std::path::Path;
//!
//! let config = PulverizeConfig::default();
//! let project = Path::new("edit.blend");
//! let info = inspect::inspect(project, &config)?;
//! let chunks = plan::plan(info.frames, 4)?;
//! let renderer = BlenderRenderer::from_config(&config)?;
//! let results = Supervisor::new(&renderer, &config).supervise_all(project, &chunks, &info.output_dir);
//! let joined = ConcatDriver::new(&config).concatenate(&info.output_dir, project)?;
//! ```
//!
//! # External tools
//!
//! Blender is searched for in `BLENDER_PATH`, then `PATH`, then common
//! installation locations. ffmpeg is searched for in `FFMPEG_PATH`, then
//! `PATH`.

pub mod concat;
pub mod config;
pub mod error;
pub mod inspect;
pub mod plan;
pub mod supervise;
pub mod tools;

pub use concat::{clean_intermediates, ConcatDriver, Concatenation};
pub use config::PulverizeConfig;
pub use error::{RenderError, RenderResult};
pub use inspect::ProjectInfo;
pub use plan::{ChunkPlan, FrameRange};
pub use supervise::{
    failed_chunks, BlenderRenderer, ChunkProgress, ChunkRenderer, JobResult, RenderJob, Supervisor,
};
