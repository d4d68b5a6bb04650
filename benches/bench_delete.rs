use shared::*;

use criterion::{criterion_group, BatchSize, Criterion};
use std::hint::black_box;
use mtree::geometry::{EuclideanDistance, Point2D};
use mtree::m_tree::MTree;
use mtree::split::MaxSpreadSplit;
use tracing::info;

/// Configures Criterion using the shared benchmark timeout.
fn configure_criterion() -> Criterion {
    Criterion::default().measurement_time(BENCH_TIMEOUT)
}

fn benchmark_delete_m_tree_2d(_c: &mut Criterion) {
    info!("Setting up benchmark: delete_m_tree_2d");
    let points = generate_2d_data();
    // Delete a slice of the data from a freshly built tree each iteration.
    let victims: Vec<Point2D<i32>> = points.iter().take(100).cloned().collect();
    let mut cc = configure_criterion();
    cc.bench_function("delete_m_tree_2d", |b| {
        b.iter_batched(
            || {
                let mut tree: MTree<Point2D<i32>, _, _> =
                    MTree::new(BENCH_MIN_CAPACITY, EuclideanDistance, MaxSpreadSplit).unwrap();
                for point in points.iter() {
                    tree.add(point.clone());
                }
                tree
            },
            |mut tree| {
                for victim in victims.iter() {
                    tree.remove(victim).expect("victim is stored");
                }
                black_box(tree)
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, benchmark_delete_m_tree_2d);
