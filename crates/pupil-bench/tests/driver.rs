use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use image::{GrayImage, Rgb, RgbImage};
use pupil_bench::core::ScalePolicy;
use pupil_bench::datasets::{
    AngleConvention, Dataset, DualStreamDataset, GroundTruth, LabeledDataset, MemoryBackend,
};
use pupil_bench::detectors::{
    DetectorError, DetectorRegistry, EllipseObjectResult, FlatFieldResult, PupilDetector,
    RawDetection, RawEllipse, SchemaFamily,
};
use pupil_bench::{
    run_benchmark, BenchmarkError, BenchmarkPlan, JsonTableStore, MemoryTableStore, MethodTag,
    ScaleSpec, TableStore, TrialOutcome,
};

struct FixedDetector;

impl PupilDetector for FixedDetector {
    fn detect(&mut self, _gray: &GrayImage) -> Result<RawDetection, DetectorError> {
        Ok(EllipseObjectResult {
            confidence: 0.9,
            ellipse: RawEllipse {
                center: [10.0, 10.0],
                axes: [4.0, 4.0],
                angle: 0.0,
            },
        }
        .into())
    }
}

fn counting_registry(builds: &Arc<AtomicUsize>) -> DetectorRegistry {
    let counter = builds.clone();
    let mut registry = DetectorRegistry::new();
    registry.register("stub", SchemaFamily::EllipseObject, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixedDetector) as Box<dyn PupilDetector>)
    });
    registry
}

fn plan(scales: Vec<ScaleSpec>, skip: &[&str]) -> BenchmarkPlan {
    BenchmarkPlan {
        host: "testhost".into(),
        scales,
        skip: skip.iter().map(|s| s.to_string()).collect(),
        progress_every: 1,
    }
}

fn orig() -> ScaleSpec {
    ScaleSpec {
        name: "orig".into(),
        policy: ScalePolicy::Identity,
    }
}

fn half() -> ScaleSpec {
    ScaleSpec {
        name: "half".into(),
        policy: ScalePolicy::FitToTargetArea {
            width: 32,
            height: 24,
        },
    }
}

fn frames(count: usize) -> Vec<RgbImage> {
    (0..count)
        .map(|i| RgbImage::from_pixel(64, 48, Rgb([(i * 20) as u8, 90, 90])))
        .collect()
}

/// `<root>/1/a.txt` with `label_rows` rows plus an in-memory `<root>/1/a.avi`.
fn labeled_fixture(root: &Path, frame_count: usize, label_rows: usize) -> MemoryBackend {
    let subject = root.join("1");
    fs::create_dir_all(&subject).expect("mkdir");
    let body: String = (0..label_rows).map(|i| format!("{i} {i}\n")).collect();
    fs::write(subject.join("a.txt"), body).expect("labels");
    MemoryBackend::new().with_video(subject.join("a.avi"), frames(frame_count))
}

fn tag(dataset: &str, scale: &str) -> MethodTag {
    MethodTag::new(dataset, scale, "testhost", "stub").expect("tag")
}

#[test]
fn three_frame_clip_yields_three_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = labeled_fixture(dir.path(), 3, 3);
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(backend)))];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    let summary = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig()], &[]),
        &mut store,
    )
    .expect("run");

    let method = tag("lpw", "orig");
    assert_eq!(
        summary.get(&method),
        Some(&TrialOutcome::Completed {
            records: 3,
            anomalies: 0
        })
    );
    let table = store.get(&method).expect("table");
    assert_eq!(table.len(), 3);
    assert_eq!(table.header().record_count, 3);
    assert_eq!(table.header().angle_convention, AngleConvention::NotApplicable);
    for (i, record) in table.records().iter().enumerate() {
        assert_eq!(record.frame, i);
        assert_eq!(record.method, method);
        assert_eq!(record.confidence, 0.9);
        assert_eq!(record.ellipse.center.x, 10.0);
        assert_eq!(record.ellipse.center.y, 10.0);
        assert!(record.detection_time >= 0.0);
        assert_eq!(
            record.ground_truth,
            GroundTruth::Point {
                values: vec![i as f64, i as f64]
            }
        );
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn detector_output_is_mapped_back_to_source_pixels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = labeled_fixture(dir.path(), 2, 2);
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(backend)))];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![half()], &[]),
        &mut store,
    )
    .expect("run");

    let table = store.get(&tag("lpw", "half")).expect("table");
    let record = &table.records()[0];
    assert_relative_eq!(record.ellipse.center.x, 20.0);
    assert_relative_eq!(record.ellipse.center.y, 20.0);
    assert_relative_eq!(record.ellipse.axes[0], 8.0);
    assert_relative_eq!(record.ellipse.axes[1], 8.0);
    assert_eq!(record.ellipse.angle, 0.0);
}

#[test]
fn skipped_combination_never_builds_a_detector() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = labeled_fixture(dir.path(), 3, 3);
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(backend)))];
    let builds = Arc::new(AtomicUsize::new(0));
    let out = dir.path().join("out");
    let mut store = JsonTableStore::new(&out);

    let summary = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig(), half()], &[".half."]),
        &mut store,
    )
    .expect("run");

    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(store.load(&tag("lpw", "half")).expect("load").is_none());
    assert!(store.path_for(&tag("lpw", "orig")).is_file());
}

#[test]
fn rerun_replaces_the_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = Arc::new(labeled_fixture(dir.path(), 4, 4));
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), backend.clone()))];
    let builds = Arc::new(AtomicUsize::new(0));
    let registry = counting_registry(&builds);
    let out = dir.path().join("out");
    let method = tag("lpw", "orig");

    let mut first_store = JsonTableStore::new(&out);
    run_benchmark(&datasets, &registry, &plan(vec![orig()], &[]), &mut first_store)
        .expect("first");
    let first = first_store.load(&method).expect("load").expect("artifact");

    let mut second_store = JsonTableStore::new(&out);
    run_benchmark(&datasets, &registry, &plan(vec![orig()], &[]), &mut second_store)
        .expect("second");
    let second = second_store.load(&method).expect("load").expect("artifact");

    assert_eq!(first.len(), second.len());
    assert_eq!(first.method(), second.method());
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(backend.opened(), 2);
    let artifacts = fs::read_dir(&out).expect("read_dir").count();
    assert_eq!(artifacts, 1);
}

#[test]
fn sync_fault_fails_only_its_combination() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lpw_root = dir.path().join("lpw");
    let seg_root = dir.path().join("seg");
    fs::create_dir_all(&seg_root).expect("mkdir");
    let lpw_backend = labeled_fixture(&lpw_root, 2, 2);

    let mask = RgbImage::from_fn(64, 48, |x, y| {
        let (dx, dy) = (x as f64 - 30.0, y as f64 - 20.0);
        if dx * dx + dy * dy <= 36.0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });
    let seg_backend = MemoryBackend::new()
        .with_video(seg_root.join("p1_image.mp4"), frames(3))
        .with_video(seg_root.join("p1_pupil.mp4"), vec![mask.clone(), mask]);

    let datasets: Vec<Box<dyn Dataset>> = vec![
        Box::new(
            DualStreamDataset::new("seg", &seg_root, Arc::new(seg_backend))
                .with_partitions(vec![1]),
        ),
        Box::new(LabeledDataset::new("lpw", &lpw_root, Arc::new(lpw_backend))),
    ];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    let summary = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig()], &[]),
        &mut store,
    )
    .expect("run");

    assert_eq!(summary.trials[0].method, tag("seg", "orig"));
    assert!(matches!(
        summary.get(&tag("seg", "orig")),
        Some(TrialOutcome::Failed { error }) if error.contains("diverge")
    ));
    assert!(store.get(&tag("seg", "orig")).is_none());
    assert_eq!(store.get(&tag("lpw", "orig")).expect("lpw table").len(), 2);
}

#[test]
fn schema_mismatch_aborts_the_trial() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = labeled_fixture(dir.path(), 3, 3);
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(backend)))];
    let mut registry = DetectorRegistry::new();
    registry.register("flat", SchemaFamily::EllipseObject, || {
        Ok(Box::new(|_: &GrayImage| {
            Ok::<_, DetectorError>(RawDetection::from(FlatFieldResult::default()))
        }) as Box<dyn PupilDetector>)
    });
    let mut store = MemoryTableStore::new();

    let summary =
        run_benchmark(&datasets, &registry, &plan(vec![orig()], &[]), &mut store).expect("run");

    assert_eq!(summary.failed(), 1);
    assert!(store.is_empty());
}

#[test]
fn missing_label_file_fails_its_trial_at_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let subject = dir.path().join("1");
    fs::create_dir_all(&subject).expect("mkdir");
    let backend = Arc::new(MemoryBackend::new().with_video(subject.join("a.avi"), frames(2)));
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), backend.clone()))];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    let summary = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig()], &[]),
        &mut store,
    )
    .expect("run");

    assert_eq!(summary.failed(), 1);
    assert_eq!(backend.opened(), 0);
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_root_aborts_before_any_trial() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = labeled_fixture(dir.path(), 2, 2);
    let datasets: Vec<Box<dyn Dataset>> = vec![
        Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(good))),
        Box::new(LabeledDataset::new(
            "gone",
            dir.path().join("missing"),
            Arc::new(MemoryBackend::new()),
        )),
    ];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    let err = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig()], &[]),
        &mut store,
    )
    .expect_err("missing root");

    assert!(matches!(err, BenchmarkError::Dataset { ref name, .. } if name == "gone"));
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert!(store.is_empty());
}

#[test]
fn dotted_dataset_name_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let datasets: Vec<Box<dyn Dataset>> = vec![Box::new(LabeledDataset::new(
        "lpw.v2",
        dir.path(),
        Arc::new(MemoryBackend::new()),
    ))];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    let err = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig()], &[]),
        &mut store,
    )
    .expect_err("invalid name");
    assert!(matches!(err, BenchmarkError::Config(_)));
}

#[test]
fn detector_failure_mid_clip_persists_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = labeled_fixture(dir.path(), 4, 4);
    let datasets: Vec<Box<dyn Dataset>> =
        vec![Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(backend)))];
    let mut registry = DetectorRegistry::new();
    registry.register("stub", SchemaFamily::EllipseObject, || {
        let mut calls = 0usize;
        Ok(Box::new(move |gray: &GrayImage| {
            calls += 1;
            if calls == 3 {
                return Err(DetectorError::Failed("lost track".into()));
            }
            FixedDetector.detect(gray)
        }) as Box<dyn PupilDetector>)
    });
    let out = dir.path().join("out");
    let mut store = JsonTableStore::new(&out);

    let summary =
        run_benchmark(&datasets, &registry, &plan(vec![orig()], &[]), &mut store).expect("run");

    let method = tag("lpw", "orig");
    assert!(matches!(
        summary.get(&method),
        Some(TrialOutcome::Failed { error }) if error.contains("lost track")
    ));
    assert!(!store.path_for(&method).exists());
    assert!(store.load(&method).expect("load").is_none());
}

#[test]
fn fully_skipped_dataset_root_is_not_checked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = labeled_fixture(dir.path(), 2, 2);
    let datasets: Vec<Box<dyn Dataset>> = vec![
        Box::new(LabeledDataset::new("lpw", dir.path(), Arc::new(backend))),
        Box::new(
            DualStreamDataset::new(
                "eyeseg",
                dir.path().join("missing"),
                Arc::new(MemoryBackend::new()),
            )
            .with_partitions(vec![1]),
        ),
    ];
    let builds = Arc::new(AtomicUsize::new(0));
    let mut store = MemoryTableStore::new();

    let summary = run_benchmark(
        &datasets,
        &counting_registry(&builds),
        &plan(vec![orig()], &["eyeseg"]),
        &mut store,
    )
    .expect("run");

    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(store.get(&tag("lpw", "orig")).expect("lpw table").len(), 2);
}
