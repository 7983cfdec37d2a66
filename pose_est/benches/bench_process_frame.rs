//! # Per Frame Pipeline Benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Point3;

use pose_est::graph::sq_diff_cost;
use pose_est::select::{norm_ratio_score, process_frame};
use trial_if::frame::Frame;
use trial_if::parts::{LabelAdjacency, DEFAULT_PART_CONNECTIONS};

/// A busy frame: three candidates per part type, spread around a true skeleton.
fn busy_frame() -> Frame {
    let segments = [60.0, 20.0, 15.0, 20.0, 20.0];
    let total: f64 = segments.iter().sum();

    let mut population = Vec::new();
    let mut labels = Vec::new();

    let mut z = total;
    for (label, &segment) in std::iter::once(&0.0).chain(segments.iter()).enumerate() {
        z -= segment;

        for k in 0..3 {
            let spread = k as f64 * 7.0;
            population.push(Point3::new(spread, spread * 0.5, z + k as f64));
            labels.push(label);
        }
    }

    Frame::new(population, labels).unwrap()
}

fn process_frame_benchmark(c: &mut Criterion) {
    let frame = busy_frame();

    let lengths = [60.0, 20.0, 15.0, 20.0, 20.0];
    let adjacency = LabelAdjacency::from_lengths(&DEFAULT_PART_CONNECTIONS, &lengths).unwrap();

    let radii: Vec<f64> = (0..30).map(|r| r as f64).collect();

    c.bench_function("process_frame", |b| {
        b.iter(|| {
            process_frame(&frame, &adjacency, &radii, sq_diff_cost, norm_ratio_score).unwrap()
        })
    });
}

criterion_group!(benches, process_frame_benchmark);
criterion_main!(benches);
