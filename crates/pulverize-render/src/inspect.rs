//! Project inspection.
//!
//! Blender is run in background mode with a small Python script that prints
//! the scene's frame bounds and render output path. Blender prints its own
//! banner around the script output, so the parser scans for two marker lines:
//!
//! ```text
//! FRAMES: <start> <end>
//! OUTPUTDIR: <path>
//! ```
//!
//! Anything else about those two lines (missing, out of order, wrong token
//! count, non-integer frames) is a [`RenderError::MalformedInspectorOutput`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::PulverizeConfig;
use crate::error::{RenderError, RenderResult};
use crate::plan::{FrameRange, MAX_FRAME};
use crate::tools;

/// Marker for the frame bounds line.
pub const FRAMES_MARKER: &str = "FRAMES:";
/// Marker for the output directory line.
pub const OUTPUTDIR_MARKER: &str = "OUTPUTDIR:";

/// What the renderer reports about a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub frames: FrameRange,
    pub output_dir: PathBuf,
}

/// Runs Blender's introspection pass over `project`.
pub fn inspect(project: &Path, config: &PulverizeConfig) -> RenderResult<ProjectInfo> {
    if !project.is_file() {
        return Err(RenderError::ProjectNotFound {
            path: project.to_path_buf(),
        });
    }

    let blender = tools::find_blender(config)?;
    let script = tools::resolve_inspect_script(config)?;

    // blender -b <project> -P <script>
    let mut cmd = Command::new(&blender);
    cmd.arg("-b")
        .arg(project)
        .arg("-P")
        .arg(&script.path)
        .stdin(Stdio::null());

    tracing::debug!(command = ?cmd, "inspecting project");

    let output = cmd
        .output()
        .map_err(|e| RenderError::spawn_failed(blender.display().to_string(), e))?;

    if !output.status.success() {
        return Err(RenderError::InspectorProcessFailed {
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (frames, raw_dir) = parse_inspector_output(&stdout)?;
    let output_dir = resolve_output_dir(&raw_dir, project);

    tracing::info!(
        start = frames.start(),
        end = frames.end(),
        output_dir = %output_dir.display(),
        "read project"
    );

    Ok(ProjectInfo { frames, output_dir })
}

/// Parses the inspection script's stdout into a frame range and a raw path.
pub fn parse_inspector_output(stdout: &str) -> RenderResult<(FrameRange, String)> {
    let mut frames: Option<(usize, FrameRange)> = None;
    let mut output_dir: Option<(usize, String)> = None;

    for (line_no, line) in stdout.lines().enumerate() {
        let line = line.trim_end_matches('\r');

        if frames.is_none() {
            if let Some(rest) = line.strip_prefix(FRAMES_MARKER) {
                frames = Some((line_no, parse_frames(rest)?));
                continue;
            }
        }

        if output_dir.is_none() {
            if let Some(rest) = line.strip_prefix(OUTPUTDIR_MARKER) {
                let path = rest.trim();
                if path.is_empty() {
                    return Err(RenderError::malformed("OUTPUTDIR line carries no path"));
                }
                output_dir = Some((line_no, path.to_string()));
            }
        }
    }

    let (frames_line, frames) =
        frames.ok_or_else(|| RenderError::malformed("missing FRAMES line"))?;
    let (dir_line, output_dir) =
        output_dir.ok_or_else(|| RenderError::malformed("missing OUTPUTDIR line"))?;

    if dir_line < frames_line {
        return Err(RenderError::malformed(
            "OUTPUTDIR line appears before FRAMES line",
        ));
    }

    Ok((frames, output_dir))
}

fn parse_frames(rest: &str) -> RenderResult<FrameRange> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let [start, end] = tokens.as_slice() else {
        return Err(RenderError::malformed(format!(
            "FRAMES line needs exactly two integers, got {:?}",
            rest.trim()
        )));
    };

    let start: i64 = start
        .parse()
        .map_err(|_| RenderError::malformed(format!("bad start frame {:?}", start)))?;
    let end: i64 = end
        .parse()
        .map_err(|_| RenderError::malformed(format!("bad end frame {:?}", end)))?;

    for frame in [start, end] {
        if frame.unsigned_abs() > MAX_FRAME as u64 {
            return Err(RenderError::malformed(format!(
                "frame {frame} is outside Blender's frame limit of {MAX_FRAME}"
            )));
        }
    }

    FrameRange::new(start, end)
        .map_err(|_| RenderError::malformed(format!("start frame {start} is after end frame {end}")))
}

/// Resolves Blender's `//` (relative to the .blend file) path notation.
pub fn resolve_output_dir(raw: &str, project: &Path) -> PathBuf {
    match raw.strip_prefix("//") {
        Some(relative) => {
            let project_dir = project
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let project_dir = project_dir
                .canonicalize()
                .unwrap_or_else(|_| project_dir.to_path_buf());
            project_dir.join(relative)
        }
        None => PathBuf::from(raw),
    }
}
