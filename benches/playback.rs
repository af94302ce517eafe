//! Benchmarks for motion-output playback.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{UnitQuaternion, Vector3};

use mbdyn_playback::{
    playback::{ContainerWriter, PackOptions, PlaybackEngine},
    registry::EntityRegistry,
    rotation::{AngleUnit, Parametrization, decode_orientation, encode_orientation},
    schema::PlaybackConfig,
};

const TAGS: [&str; 4] = ["euler123", "phi", "mat", "quat"];

fn build_registry(nodes: u32) -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    for label in 1..=nodes {
        let p = Parametrization::parse(TAGS[label as usize % TAGS.len()]).unwrap();
        registry.upsert_node_decoded(label, Vector3::zeros(), UnitQuaternion::identity(), p);
    }
    registry
}

fn write_motion(path: &Path, nodes: u32, steps: usize) {
    let mut text = String::new();
    for step in 0..steps {
        for label in 1..=nodes {
            let p = Parametrization::parse(TAGS[label as usize % TAGS.len()]).unwrap();
            let angle = (step as f64 * 0.01 + label as f64) % 1.5;
            let q = UnitQuaternion::from_euler_angles(angle, 0.5 * angle, 0.1);
            write!(text, "{} {} {} {}", label, step, label, angle).unwrap();
            for v in encode_orientation(&q, p, AngleUnit::Degrees) {
                write!(text, " {}", v).unwrap();
            }
            // Velocities
            text.push_str(" 0 0 0 0 0 0\n");
        }
    }
    fs::write(path, text).unwrap();
}

fn bench_text_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_playback");
    let dir = tempfile::tempdir().unwrap();

    for nodes in [10, 100] {
        let registry = build_registry(nodes);
        let path = dir.path().join(format!("run_{}.mov", nodes));
        write_motion(&path, nodes, 200);

        for decimation in [1, 10] {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}_nodes_every_{}", nodes, decimation)),
                &decimation,
                |b, &decimation| {
                    b.iter(|| {
                        let config = PlaybackConfig::with_decimation(decimation);
                        let mut engine = PlaybackEngine::new(&registry, config).unwrap();
                        engine.open(&path).unwrap();
                        for frame in engine.frames() {
                            black_box(frame.unwrap());
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_container_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("container_playback");
    let dir = tempfile::tempdir().unwrap();

    let nodes = 100;
    let registry = build_registry(nodes);
    let text = dir.path().join("run.mov");
    let packed = dir.path().join("run.mbts");
    write_motion(&text, nodes, 200);
    ContainerWriter::from_text(&registry, &text, &packed, PackOptions::default()).unwrap();

    group.bench_function("100_nodes", |b| {
        b.iter(|| {
            let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
            engine.open(&packed).unwrap();
            for frame in engine.frames() {
                black_box(frame.unwrap());
            }
        });
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_orientation");
    let q = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);

    for tag in TAGS {
        let p = Parametrization::parse(tag).unwrap();
        let raw = encode_orientation(&q, p, AngleUnit::Degrees);
        group.bench_with_input(BenchmarkId::from_parameter(tag), &raw, |b, raw| {
            b.iter(|| decode_orientation(black_box(raw), p, AngleUnit::Degrees).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_text_playback,
    bench_container_playback,
    bench_decode
);
criterion_main!(benches);
