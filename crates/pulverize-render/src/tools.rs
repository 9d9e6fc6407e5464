//! Discovery of the external tools: Blender, ffmpeg and the inspection script.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::PulverizeConfig;
use crate::error::{RenderError, RenderResult};

const EMBEDDED_INSPECT_PY: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/inspect_project.py"
));

/// Finds the Blender executable.
///
/// Search order: config override, `BLENDER_PATH`, `PATH`, then the usual
/// install locations for the platform.
pub fn find_blender(config: &PulverizeConfig) -> RenderResult<PathBuf> {
    overridden(config.blender_path.as_deref(), "BLENDER_PATH")
        .or_else(|| which::which("blender").ok())
        .or_else(installed_blender)
        .ok_or(RenderError::BlenderNotFound)
}

/// Finds the ffmpeg executable: config override, `FFMPEG_PATH`, then `PATH`.
pub fn find_ffmpeg(config: &PulverizeConfig) -> RenderResult<PathBuf> {
    overridden(config.ffmpeg_path.as_deref(), "FFMPEG_PATH")
        .or_else(|| which::which("ffmpeg").ok())
        .ok_or(RenderError::FfmpegNotFound)
}

/// An explicit path, else the path named by `env_var`, if either exists.
fn overridden(explicit: Option<&Path>, env_var: &str) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .filter(|path| path.exists())
        .or_else(|| {
            std::env::var_os(env_var)
                .map(PathBuf::from)
                .filter(|path| path.exists())
        })
}

#[cfg(windows)]
fn installed_blender() -> Option<PathBuf> {
    // One directory per installed version; prefer the newest.
    let root = Path::new(r"C:\Program Files\Blender Foundation");
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("blender.exe"))
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();
    candidates.pop()
}

#[cfg(target_os = "macos")]
fn installed_blender() -> Option<PathBuf> {
    Some(PathBuf::from("/Applications/Blender.app/Contents/MacOS/Blender"))
        .filter(|path| path.is_file())
}

#[cfg(not(any(windows, target_os = "macos")))]
fn installed_blender() -> Option<PathBuf> {
    ["/usr/bin/blender", "/usr/local/bin/blender", "/snap/bin/blender"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Inspection script location, keeping any temp file alive for the run.
pub(crate) struct InspectScript {
    pub path: PathBuf,
    _tempfile: Option<tempfile::NamedTempFile>,
}

/// Resolves the inspection script: config override, `PULVERIZE_INSPECT_SCRIPT`,
/// then the embedded copy written to a temp file.
pub(crate) fn resolve_inspect_script(config: &PulverizeConfig) -> RenderResult<InspectScript> {
    if let Some(path) = overridden(config.inspect_script.as_deref(), "PULVERIZE_INSPECT_SCRIPT") {
        return Ok(InspectScript {
            path,
            _tempfile: None,
        });
    }

    let mut file = tempfile::Builder::new()
        .prefix("pulverize_inspect_")
        .suffix(".py")
        .tempfile()?;
    file.write_all(EMBEDDED_INSPECT_PY.as_bytes())?;
    file.flush()?;

    Ok(InspectScript {
        path: file.path().to_path_buf(),
        _tempfile: Some(file),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("blender");
        std::fs::write(&fake, "").unwrap();

        let config = PulverizeConfig::new().blender_path(&fake);
        assert_eq!(find_blender(&config).unwrap(), fake);
    }

    #[test]
    fn test_missing_override_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(overridden(Some(missing.as_path()), "PULVERIZE_TEST_UNSET_VAR"), None);

        let present = dir.path().join("tool");
        std::fs::write(&present, "").unwrap();
        assert_eq!(
            overridden(Some(present.as_path()), "PULVERIZE_TEST_UNSET_VAR"),
            Some(present.clone())
        );
    }

    #[test]
    fn test_ffmpeg_config_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        std::fs::write(&fake, "").unwrap();

        let config = PulverizeConfig::new().ffmpeg_path(&fake);
        assert_eq!(find_ffmpeg(&config).unwrap(), fake);
    }

    #[test]
    fn test_resolve_inspect_script_falls_back_to_embedded() {
        if std::env::var_os("PULVERIZE_INSPECT_SCRIPT").is_some() {
            eprintln!("PULVERIZE_INSPECT_SCRIPT is set; skipping embedded script test");
            return;
        }

        let config = PulverizeConfig::new().inspect_script("this/does/not/exist.py");
        let script = resolve_inspect_script(&config).unwrap();
        assert!(script.path.exists());

        let content = std::fs::read_to_string(&script.path).unwrap();
        assert!(content.contains("FRAMES: "));
        assert!(content.contains("OUTPUTDIR: "));
    }
}
