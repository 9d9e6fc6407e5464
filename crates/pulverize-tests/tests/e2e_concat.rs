//! End-to-end tests for concatenation against a fake ffmpeg.

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::fs;

use pulverize_cli::commands::{execute, RunOptions};
use pulverize_render::concat::{manifest_contents, MANIFEST_NAME};
use pulverize_render::RenderError;
use pulverize_tests::harness::{chunk_contents, FarmBuilder};

#[test]
fn concat_only_joins_existing_chunks() {
    let farm = FarmBuilder::new(1, 30).build();
    // Written out of order on purpose.
    let third = farm.write_chunk(21, 30);
    let first = farm.write_chunk(1, 10);
    let second = farm.write_chunk(11, 20);
    let options = RunOptions {
        concat_only: true,
        ..farm.options(3)
    };

    let summary = execute(&options, &farm.config()).unwrap();

    assert!(farm.render_calls().is_empty());
    assert!(summary.jobs.is_empty());
    assert_eq!(summary.workers, None);

    let manifest = fs::read_to_string(farm.output_dir.join(MANIFEST_NAME)).unwrap();
    assert_eq!(manifest, manifest_contents(&[first, second, third]));

    let output = summary.output.unwrap();
    assert_eq!(
        fs::read_to_string(output).unwrap(),
        format!(
            "{}{}{}",
            chunk_contents(1, 10),
            chunk_contents(11, 20),
            chunk_contents(21, 30)
        )
    );
}

#[test]
fn concat_only_without_chunks_fails() {
    let farm = FarmBuilder::new(1, 30).build();
    let options = RunOptions {
        concat_only: true,
        ..farm.options(3)
    };

    let err = execute(&options, &farm.config()).unwrap_err();

    assert!(matches!(err, RenderError::NoChunksFound { .. }));
    assert!(farm.ffmpeg_calls().is_empty());
}

#[test]
fn ffmpeg_failure_is_reported() {
    let farm = FarmBuilder::new(1, 20).ffmpeg_exit(1).build();

    let err = execute(&farm.options(2), &farm.config()).unwrap_err();

    assert!(matches!(
        err,
        RenderError::ConcatenationFailed { exit_code: 1 }
    ));
    assert_eq!(farm.ffmpeg_calls().len(), 1);
}

#[test]
fn ffmpeg_gets_stream_copy_arguments() {
    let farm = FarmBuilder::new(1, 20).build();

    execute(&farm.options(2), &farm.config()).unwrap();

    let calls = farm.ffmpeg_calls();
    assert_eq!(calls.len(), 1);
    let args = &calls[0];
    assert!(args.starts_with("-v error -y -stats -f concat -safe 0 -i "));
    assert!(args.contains(" -c copy "));
    assert!(args.ends_with("edit.mp4"));
}

#[test]
fn dry_run_concat_writes_manifest_without_ffmpeg() {
    let farm = FarmBuilder::new(1, 20).build();
    farm.write_chunk(1, 10);
    farm.write_chunk(11, 20);
    let options = RunOptions {
        concat_only: true,
        ..farm.options(2)
    };

    let summary = execute(&options, &farm.config().dry_run(true)).unwrap();

    assert!(farm.ffmpeg_calls().is_empty());
    assert!(farm.output_dir.join(MANIFEST_NAME).exists());
    assert_eq!(summary.output, Some(farm.output_dir.join("edit.mp4")));
    assert!(!farm.output_dir.join("edit.mp4").exists());
}

#[test]
fn clean_removes_intermediates() {
    let farm = FarmBuilder::new(1, 40).build();
    let options = RunOptions {
        clean: true,
        ..farm.options(4)
    };

    execute(&options, &farm.config()).unwrap();

    assert_eq!(farm.output_files(), vec!["edit.mp4"]);
}

#[test]
fn report_is_written_by_run() {
    let farm = FarmBuilder::new(1, 20).build();
    let report = farm.root.join("report.json");
    let options = RunOptions {
        report: Some(report.clone()),
        ..farm.options(2)
    };

    pulverize_cli::commands::render::run(&options, &farm.config()).unwrap();

    let json = fs::read_to_string(&report).unwrap();
    assert!(json.contains("\"jobs\""));
    assert!(json.contains("edit.mp4"));
}
