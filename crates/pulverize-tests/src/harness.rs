//! Fake render farm: a temp directory holding a project file, an output
//! directory and scripted stand-ins for Blender and ffmpeg.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use pulverize_cli::commands::RunOptions;
use pulverize_render::PulverizeConfig;

const FAKE_BLENDER: &str = r##"#!/bin/sh
# Fake Blender: `-P` prints the canned inspector output, otherwise renders
# the `-s`/`-e` frame range into `<pattern with frame token replaced>.mp4`.
mode=render
while [ $# -gt 0 ]; do
    case "$1" in
        -P) mode=inspect; shift ;;
        -s) start="$2"; shift ;;
        -e) end="$2"; shift ;;
        -o) pattern="$2"; shift ;;
    esac
    shift
done

if [ "$mode" = inspect ]; then
    cat '@INSPECT_FILE@'
    exit @INSPECT_EXIT@
fi

echo "$start $end" >> '@CALLS@'

for slow in none @SLOW@; do
    if [ "$start" = "$slow" ]; then sleep 0.4; fi
done

for fail in none @FAIL@; do
    if [ "$start" = "$fail" ]; then exit 1; fi
done

frame="$start"
while [ "$frame" -le "$end" ]; do
    echo "Append frame $frame"
    frame=$((frame + 1))
done

range=$(printf '%07d-%07d' "$start" "$end")
out=$(printf '%s' "$pattern" | sed "s/#######/$range/")
echo "frames $start-$end" > "$out.mp4"
"##;

const FAKE_FFMPEG: &str = r##"#!/bin/sh
# Fake ffmpeg: concatenates the files listed in the `-i` manifest into the
# last argument.
echo "$@" >> '@CALLS@'
manifest=""
while [ $# -gt 1 ]; do
    if [ "$1" = "-i" ]; then manifest="$2"; fi
    shift
done
out="$1"
sed "s/^file '\(.*\)'$/\1/" "$manifest" | while IFS= read -r chunk; do cat "$chunk"; done > "$out"
exit @EXIT@
"##;

/// Builder for a [`FakeRenderFarm`].
#[derive(Debug, Clone)]
pub struct FarmBuilder {
    frames: (i64, i64),
    output_setting: Option<String>,
    inspector_output: Option<String>,
    inspector_exit: i32,
    failing_starts: Vec<i64>,
    slow_starts: Vec<i64>,
    ffmpeg_exit: i32,
    create_output_dir: bool,
}

impl FarmBuilder {
    /// Project with frames `start..=end` rendering into an existing directory.
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            frames: (start, end),
            output_setting: None,
            inspector_output: None,
            inspector_exit: 0,
            failing_starts: Vec::new(),
            slow_starts: Vec::new(),
            ffmpeg_exit: 0,
            create_output_dir: true,
        }
    }

    /// Output path as stored in the project (e.g. `//render/`).
    pub fn output_setting(mut self, setting: &str) -> Self {
        self.output_setting = Some(setting.to_string());
        self
    }

    /// Replaces the inspector's stdout entirely.
    pub fn inspector_output(mut self, stdout: &str) -> Self {
        self.inspector_output = Some(stdout.to_string());
        self
    }

    pub fn inspector_exit(mut self, code: i32) -> Self {
        self.inspector_exit = code;
        self
    }

    /// The chunk starting at `frame` exits 1 without writing output.
    pub fn fail_chunk_starting_at(mut self, frame: i64) -> Self {
        self.failing_starts.push(frame);
        self
    }

    /// The chunk starting at `frame` finishes after the others.
    pub fn slow_chunk_starting_at(mut self, frame: i64) -> Self {
        self.slow_starts.push(frame);
        self
    }

    pub fn ffmpeg_exit(mut self, code: i32) -> Self {
        self.ffmpeg_exit = code;
        self
    }

    /// Leave the output directory uncreated.
    pub fn without_output_dir(mut self) -> Self {
        self.create_output_dir = false;
        self
    }

    pub fn build(self) -> FakeRenderFarm {
        let dir = TempDir::new().expect("Failed to create farm dir");
        let root = dir
            .path()
            .canonicalize()
            .expect("Failed to resolve farm dir");

        let project = root.join("edit.blend");
        fs::write(&project, b"BLENDER-v402").expect("Failed to write project");

        let output_dir = root.join("render");
        if self.create_output_dir {
            fs::create_dir(&output_dir).expect("Failed to create output dir");
        }

        let setting = self
            .output_setting
            .unwrap_or_else(|| format!("{}/", output_dir.display()));
        let inspector_stdout = self.inspector_output.unwrap_or_else(|| {
            format!(
                "Blender 4.2.0 (fake)\nFRAMES: {} {}\nOUTPUTDIR: {}\n\nBlender quit\n",
                self.frames.0, self.frames.1, setting
            )
        });
        let inspect_file = root.join("inspect.txt");
        fs::write(&inspect_file, inspector_stdout).expect("Failed to write inspector output");

        let render_calls = root.join("render_calls.log");
        let ffmpeg_calls = root.join("ffmpeg_calls.log");

        let blender = root.join("blender");
        write_script(
            &blender,
            &FAKE_BLENDER
                .replace("@INSPECT_FILE@", &inspect_file.display().to_string())
                .replace("@INSPECT_EXIT@", &self.inspector_exit.to_string())
                .replace("@CALLS@", &render_calls.display().to_string())
                .replace("@SLOW@", &join_frames(&self.slow_starts))
                .replace("@FAIL@", &join_frames(&self.failing_starts)),
        );

        let ffmpeg = root.join("ffmpeg");
        write_script(
            &ffmpeg,
            &FAKE_FFMPEG
                .replace("@CALLS@", &ffmpeg_calls.display().to_string())
                .replace("@EXIT@", &self.ffmpeg_exit.to_string()),
        );

        FakeRenderFarm {
            _dir: dir,
            root,
            project,
            output_dir,
            blender,
            ffmpeg,
            render_calls,
            ffmpeg_calls,
        }
    }
}

fn join_frames(frames: &[i64]) -> String {
    frames
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).expect("Failed to write fake tool");
    let mut perms = fs::metadata(path)
        .expect("Failed to stat fake tool")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to chmod fake tool");
}

/// A project plus fake tools, removed when dropped.
pub struct FakeRenderFarm {
    _dir: TempDir,
    pub root: PathBuf,
    pub project: PathBuf,
    pub output_dir: PathBuf,
    blender: PathBuf,
    ffmpeg: PathBuf,
    render_calls: PathBuf,
    ffmpeg_calls: PathBuf,
}

impl FakeRenderFarm {
    /// Config pointing at the fake tools.
    pub fn config(&self) -> PulverizeConfig {
        PulverizeConfig::new()
            .blender_path(&self.blender)
            .ffmpeg_path(&self.ffmpeg)
            .poll_interval(Duration::from_millis(10))
    }

    pub fn options(&self, workers: i64) -> RunOptions {
        RunOptions {
            project: self.project.clone(),
            workers: Some(workers),
            ..Default::default()
        }
    }

    /// `(start, end)` of every render the fake Blender started, sorted.
    pub fn render_calls(&self) -> Vec<(i64, i64)> {
        let mut calls: Vec<(i64, i64)> = read_lines(&self.render_calls)
            .iter()
            .map(|line| {
                let mut parts = line.split_whitespace().map(|p| p.parse::<i64>().unwrap());
                (parts.next().unwrap(), parts.next().unwrap())
            })
            .collect();
        calls.sort();
        calls
    }

    /// Argument lines of every ffmpeg invocation.
    pub fn ffmpeg_calls(&self) -> Vec<String> {
        read_lines(&self.ffmpeg_calls)
    }

    /// Names of the files in the output directory, sorted.
    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Drops a pre-rendered chunk into the output directory.
    pub fn write_chunk(&self, start: i64, end: i64) -> PathBuf {
        let path = self
            .output_dir
            .join(format!("pulverize_frames_{:07}-{:07}.mp4", start, end));
        fs::write(&path, chunk_contents(start, end)).expect("Failed to write chunk");
        path
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Contents the fake tools produce for a chunk of frames.
pub fn chunk_contents(start: i64, end: i64) -> String {
    format!("frames {}-{}\n", start, end)
}
