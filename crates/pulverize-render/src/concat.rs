//! Chunk concatenation with ffmpeg's concat demuxer.
//!
//! Chunk files are named `pulverize_frames_<start>-<end>.<ext>` with Blender's
//! seven-digit zero padding, so sorting by file name restores frame order no
//! matter which worker finished first.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::PulverizeConfig;
use crate::error::{RenderError, RenderResult};
use crate::tools;

/// File name prefix shared by every rendered chunk.
pub const CHUNK_PREFIX: &str = "pulverize_frames_";

/// Name of the ffmpeg concat manifest written next to the chunks.
pub const MANIFEST_NAME: &str = "pulverize_input_files.txt";

/// Files produced by a concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concatenation {
    pub output_path: PathBuf,
    pub manifest_path: PathBuf,
    pub chunk_paths: Vec<PathBuf>,
}

/// Joins rendered chunks into one file.
pub struct ConcatDriver<'a> {
    config: &'a PulverizeConfig,
}

impl<'a> ConcatDriver<'a> {
    pub fn new(config: &'a PulverizeConfig) -> Self {
        Self { config }
    }

    /// Concatenates every chunk in `output_dir` into `<project stem><chunk ext>`.
    ///
    /// The manifest is always written; ffmpeg only runs outside dry-run mode.
    pub fn concatenate(&self, output_dir: &Path, project: &Path) -> RenderResult<Concatenation> {
        let chunk_paths = scan_chunks(output_dir)?;
        // The concat demuxer resolves relative entries against the manifest's
        // own directory, not the working directory.
        let output_dir = output_dir.canonicalize()?;
        let output_dir = output_dir.as_path();
        tracing::info!(
            chunks = chunk_paths.len(),
            dir = %output_dir.display(),
            "joining rendered chunks"
        );

        let manifest_path = output_dir.join(MANIFEST_NAME);
        fs::write(&manifest_path, manifest_contents(&chunk_paths)).map_err(|source| {
            RenderError::WriteManifestFailed {
                path: manifest_path.clone(),
                source,
            }
        })?;

        let output_path = output_dir.join(output_file_name(project, &chunk_paths[0]));

        if self.config.dry_run {
            tracing::info!(
                output = %output_path.display(),
                "dry run: skipping ffmpeg"
            );
        } else {
            self.run_ffmpeg(&manifest_path, &output_path)?;
            tracing::info!(output = %output_path.display(), "joined chunks");
        }

        Ok(Concatenation {
            output_path,
            manifest_path,
            chunk_paths,
        })
    }

    fn run_ffmpeg(&self, manifest: &Path, output: &Path) -> RenderResult<()> {
        let ffmpeg = tools::find_ffmpeg(self.config)?;
        let mut cmd = ffmpeg_command(&ffmpeg, manifest, output, self.config.verbose);
        tracing::debug!(command = ?cmd, "ffmpeg command");

        let status = cmd
            .status()
            .map_err(|e| RenderError::spawn_failed(ffmpeg.display().to_string(), e))?;

        if !status.success() {
            return Err(RenderError::ConcatenationFailed {
                exit_code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

/// Removes the chunk files and manifest once they have been joined.
pub fn clean_intermediates(concat: &Concatenation) -> RenderResult<()> {
    tracing::info!("removing temporary chunk files");
    for path in concat.chunk_paths.iter().chain([&concat.manifest_path]) {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Lists chunk files in `dir` as absolute paths, sorted by file name.
///
/// A missing directory counts as empty.
pub fn scan_chunks(dir: &Path) -> RenderResult<Vec<PathBuf>> {
    let not_found = || RenderError::NoChunksFound {
        dir: dir.to_path_buf(),
    };
    let entries = match dir.canonicalize().and_then(fs::read_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let mut chunks = Vec::new();
    for entry in entries {
        let entry = entry?;
        let is_chunk = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(CHUNK_PREFIX));
        if is_chunk && entry.file_type()?.is_file() {
            chunks.push(entry.path());
        }
    }

    if chunks.is_empty() {
        return Err(not_found());
    }

    chunks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(chunks)
}

/// One `file '<path>'` directive per chunk, in the order given.
pub fn manifest_contents(chunks: &[PathBuf]) -> String {
    chunks
        .iter()
        .map(|path| format!("file {}\n", quote_concat_path(path)))
        .collect()
}

/// Quotes a path for the concat demuxer, where `'` becomes `'\''`.
fn quote_concat_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// `<project stem><extension of the first chunk>`.
pub fn output_file_name(project: &Path, first_chunk: &Path) -> String {
    let stem = project
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match first_chunk.extension() {
        Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
        None => stem,
    }
}

fn ffmpeg_command(ffmpeg: &Path, manifest: &Path, output: &Path, verbose: bool) -> Command {
    // ffmpeg [-v error] -y -stats -f concat -safe 0 -i <manifest> -c copy <output>
    let mut cmd = Command::new(ffmpeg);
    if !verbose {
        cmd.args(["-v", "error"]);
    }
    cmd.args(["-y", "-stats", "-f", "concat", "-safe", "0", "-i"])
        .arg(manifest)
        .args(["-c", "copy"])
        .arg(output)
        .stdin(Stdio::null());
    cmd
}
