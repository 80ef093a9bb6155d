use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use pupil_bench::core::ScalePolicy;
use pupil_bench::datasets::{ClipFilter, DEFAULT_VIDEO_EXTENSION};
use pupil_bench::{BenchmarkConfig, DatasetKind, DatasetSpec, ScaleSpec, VideoBackendKind};

fn bin() -> Command {
    Command::cargo_bin("pupil-bench").expect("binary")
}

fn eye_frame(cx: f64, cy: f64) -> RgbImage {
    RgbImage::from_fn(64, 48, |x, y| {
        let (dx, dy) = (x as f64 - cx, y as f64 - cy);
        if (dx / 7.0).powi(2) + (dy / 5.0).powi(2) <= 1.0 {
            Rgb([15, 15, 15])
        } else {
            Rgb([190, 185, 180])
        }
    })
}

/// `<root>/1/a/NNNN.png` frames plus `<root>/1/a.txt` labels.
fn sequence_fixture(root: &Path, frames: usize) {
    let clip = root.join("1").join("a");
    fs::create_dir_all(&clip).expect("mkdir");
    let mut labels = String::new();
    for i in 0..frames {
        let cx = 30.0 + i as f64;
        eye_frame(cx, 24.0)
            .save(clip.join(format!("{i:04}.png")))
            .expect("png");
        labels.push_str(&format!("{cx} 24.0\n"));
    }
    fs::write(root.join("1").join("a.txt"), labels).expect("labels");
}

fn write_config(dir: &Path, root: PathBuf) -> PathBuf {
    let config = BenchmarkConfig {
        host: Some("ci".into()),
        output_dir: dir.join("out"),
        video_backend: VideoBackendKind::ImageSequence,
        progress_every: 1,
        datasets: vec![DatasetSpec {
            name: "lpw".into(),
            root,
            kind: DatasetKind::Labeled {
                filter: ClipFilter::default(),
                video_extension: DEFAULT_VIDEO_EXTENSION.into(),
            },
        }],
        scales: vec![
            ScaleSpec {
                name: "orig".into(),
                policy: ScalePolicy::Identity,
            },
            ScaleSpec {
                name: "small".into(),
                policy: ScalePolicy::FitToTargetArea {
                    width: 32,
                    height: 24,
                },
            },
        ],
        ..BenchmarkConfig::default()
    };
    let path = dir.join("bench.json");
    config.write_json(&path).expect("config");
    path
}

#[test]
fn help_lists_subcommands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("extract-frames"))
        .stdout(predicate::str::contains("init-config"));
}

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("defaults.json");
    bin()
        .args(["init-config", "--out"])
        .arg(&out)
        .assert()
        .success();
    let config = BenchmarkConfig::load_json(&out).expect("load");
    assert_eq!(config, BenchmarkConfig::default());
}

#[test]
fn run_writes_one_artifact_per_combination() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("LPW");
    sequence_fixture(&root, 3);
    let config = write_config(dir.path(), root);

    bin()
        .args(["--log-level", "warn", "run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"completed\""));

    let out = dir.path().join("out");
    assert!(out.join("benchmark.lpw.orig.ci.dark.json").is_file());
    assert!(out.join("benchmark.lpw.small.ci.dark.json").is_file());
}

#[test]
fn skip_and_dry_run_write_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("LPW");
    sequence_fixture(&root, 2);
    let config = write_config(dir.path(), root);

    bin()
        .args(["run", "--dry-run", "--skip", ".small.", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"skipped\""));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn root_override_pointing_nowhere_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("LPW");
    sequence_fixture(&root, 1);
    let config = write_config(dir.path(), root);

    bin()
        .args(["run", "--root"])
        .arg(format!("lpw={}", dir.path().join("missing").display()))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unusable"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn extract_then_show_a_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("LPW");
    sequence_fixture(&root, 2);
    let images = dir.path().join("images");

    bin()
        .args(["extract-frames", "--root"])
        .arg(&root)
        .arg("--out")
        .arg(&images)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"frames\": 2"));
    assert!(images.join("1").join("a").join("0001.png").is_file());

    let debug = dir.path().join("mask.png");
    bin()
        .args(["show-frame", "--subject", "1", "--clip", "a", "--index", "1", "--root"])
        .arg(&root)
        .arg("--debug-image")
        .arg(&debug)
        .assert()
        .success()
        .stdout(predicate::str::contains("ground_truth"))
        .stdout(predicate::str::contains("31.0"));
    assert!(debug.is_file());
}

#[test]
fn show_frame_past_the_end_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("LPW");
    sequence_fixture(&root, 2);

    bin()
        .args(["show-frame", "--subject", "1", "--clip", "a", "--index", "5", "--root"])
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn unknown_log_level_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    bin()
        .args(["--log-level", "loud", "init-config", "--out"])
        .arg(dir.path().join("cfg.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level"));
    assert!(!dir.path().join("cfg.json").exists());
}
