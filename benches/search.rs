//! Benchmarks for index search and clustering

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flann::{ParamOverrides, Points, Session};
use rand::prelude::*;

fn generate_random_vectors(count: usize, dimension: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count * dimension).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn benchmark_index_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search");
    let overrides = ParamOverrides::new();

    for &num_vectors in &[1000, 10000] {
        for &dimension in &[32, 128] {
            let data = generate_random_vectors(num_vectors, dimension);
            let queries = generate_random_vectors(100, dimension);

            let mut session = Session::with_seed(1);
            session
                .build_index(Points::new(&data, num_vectors, dimension).unwrap(), &overrides)
                .unwrap();
            let queries = Points::new(&queries, 100, dimension).unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("{}d", dimension), num_vectors),
                &queries,
                |b, &queries| {
                    b.iter(|| session.nn_index(black_box(queries), 10, &overrides).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn benchmark_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchical_kmeans");
    group.sample_size(10);

    let data = generate_random_vectors(2000, 16);
    let points = Points::new(&data, 2000, 16).unwrap();
    let overrides = ParamOverrides::new();

    for &branch_size in &[4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(branch_size), &branch_size, |b, &branch_size| {
            let mut session = Session::with_seed(7);
            b.iter(|| {
                session
                    .hierarchical_kmeans(black_box(points), branch_size, 4, Some(10), None, &overrides)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_index_search, benchmark_kmeans);
criterion_main!(benches);
