use criterion::criterion_main;

mod bench_delete;

// Main entry point for running the benchmarks
criterion_main!(
    bench_delete::benches,
    bench_insert::benches,
    bench_knn_search::benches,
    bench_range_search::benches,
);
