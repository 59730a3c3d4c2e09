/// Benchmarks for the local-file partial read paths
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use tempfile::TempDir;
use vigil_storage::{LocalFileBackend, StorageBackend};

const TOTAL_ROWS: usize = 200_000;

fn populated_backend() -> (TempDir, LocalFileBackend) {
    let dir = TempDir::new().unwrap();
    let backend = LocalFileBackend::new(dir.path());
    let mut rng = rand::thread_rng();
    let body: Vec<u8> = (0..TOTAL_ROWS)
        .flat_map(|i| {
            format!(
                "[{{\"type\":\"number\",\"value\":{}}},{{\"type\":\"number\",\"value\":{}}}]\n",
                i,
                rng.gen::<f64>()
            )
            .into_bytes()
        })
        .collect();
    backend.replace("bench-data", &body).unwrap();
    (dir, backend)
}

/// Benchmark reading the most recent rows
fn bench_read_last(c: &mut Criterion) {
    let (_dir, backend) = populated_backend();
    let mut group = c.benchmark_group("read_last");

    for n in [100, 5_000, 50_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| backend.read_last(black_box("bench-data"), n).unwrap());
        });
    }

    group.finish();
}

/// Benchmark ranged reads at increasing offsets
fn bench_read_range(c: &mut Criterion) {
    let (_dir, backend) = populated_backend();
    let mut group = c.benchmark_group("read_range");

    for start in [0, 50_000, 150_000] {
        group.bench_with_input(BenchmarkId::from_parameter(start), &start, |b, &start| {
            b.iter(|| {
                backend
                    .read_range(black_box("bench-data"), start, start + 1_000)
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Baseline: full read then slice in memory
fn bench_full_read(c: &mut Criterion) {
    let (_dir, backend) = populated_backend();
    c.bench_function("full_read", |b| {
        b.iter(|| backend.read(black_box("bench-data")).unwrap());
    });
}

criterion_group!(benches, bench_read_last, bench_read_range, bench_full_read);
criterion_main!(benches);
