use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use pupil_bench_core::{fit_ellipse, normalize, Point2, ScalePolicy};

fn eye_fixture(width: u32, height: u32) -> GrayImage {
    let (cx, cy) = (width as f64 * 0.5, height as f64 * 0.5);
    GrayImage::from_fn(width, height, |x, y| {
        let dx = (x as f64 - cx) / 40.0;
        let dy = (y as f64 - cy) / 30.0;
        if dx * dx + dy * dy <= 1.0 {
            Luma([20])
        } else {
            Luma([((x * 7 + y * 3) % 120 + 100) as u8])
        }
    })
}

fn bench_normalize(c: &mut Criterion) {
    let lpw = eye_fixture(640, 480);
    let swirski = eye_fixture(620, 460);
    let policy = ScalePolicy::FitToTargetArea {
        width: 320,
        height: 240,
    };

    c.bench_function("normalize_640x480_to_320x240", |b| {
        b.iter(|| {
            let scaled = normalize(black_box(&lpw), black_box(&policy)).expect("scale");
            black_box(scaled.image.width())
        })
    });

    c.bench_function("normalize_620x460_to_320x240", |b| {
        b.iter(|| {
            let scaled = normalize(black_box(&swirski), black_box(&policy)).expect("scale");
            black_box(scaled.image.width())
        })
    });
}

fn bench_fit(c: &mut Criterion) {
    let points: Vec<Point2<f64>> = (0..256)
        .map(|i| {
            let t = i as f64 / 256.0 * std::f64::consts::TAU;
            Point2::new(320.0 + 40.0 * t.cos(), 240.0 + 25.0 * t.sin())
        })
        .collect();

    c.bench_function("fit_ellipse_256pts", |b| {
        b.iter(|| black_box(fit_ellipse(black_box(&points)).expect("fit")))
    });
}

criterion_group!(benches, bench_normalize, bench_fit);
criterion_main!(benches);
