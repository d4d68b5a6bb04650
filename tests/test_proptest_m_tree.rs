//! Property-based tests for the M-tree

use shared::*;

use mtree::geometry::{EuclideanDistance, Point2D};
use mtree::m_tree::MTree;
use mtree::split::{MaxSpreadSplit, OrderedExtremesSplit};
use proptest::prelude::*;

prop_compose! {
    fn arb_point_2d()(x in -100.0..100.0, y in -100.0..100.0) -> (f64, f64) {
        (x, y)
    }
}

fn points_2d_from_coords(coords: &[(f64, f64)]) -> Vec<Point2D<i32>> {
    coords
        .iter()
        .enumerate()
        .map(|(idx, (x, y))| Point2D::new(*x, *y, Some(idx as i32)))
        .collect()
}

fn build_tree(points: &[Point2D<i32>]) -> MTree<Point2D<i32>, EuclideanDistance, MaxSpreadSplit> {
    let mut tree = MTree::new(MIN_CAPACITY, EuclideanDistance, MaxSpreadSplit).unwrap();
    for point in points {
        tree.add(point.clone());
    }
    tree
}

proptest! {
    #[test]
    fn test_knn_finds_inserted_point(
        coords in prop::collection::vec(arb_point_2d(), 1..30)
    ) {
        let points = points_2d_from_coords(&coords);
        let tree = build_tree(&points);

        for point in &points {
            let results: Vec<_> = tree.knn_query(point, 1).collect();
            prop_assert_eq!(results.len(), 1);
            let (_, d) = results[0];
            prop_assert!(d <= 1e-9);
        }
    }

    #[test]
    fn test_range_query_matches_brute_force(
        coords in prop::collection::vec(arb_point_2d(), 1..40),
        target_coords in arb_point_2d(),
        radius in 0.0..150.0
    ) {
        let points = points_2d_from_coords(&coords);
        let target = Point2D::new(target_coords.0, target_coords.1, None);
        let tree = build_tree(&points);

        let results: Vec<_> = tree.range_query(&target, radius).collect();
        check_range_against_brute_force(&points, &target, radius, &results);
    }

    #[test]
    fn test_knn_query_matches_brute_force(
        coords in prop::collection::vec(arb_point_2d(), 1..40),
        target_coords in arb_point_2d(),
        k in 0usize..12
    ) {
        let points = points_2d_from_coords(&coords);
        let target = Point2D::new(target_coords.0, target_coords.1, None);
        let tree = build_tree(&points);

        let results: Vec<_> = tree.knn_query(&target, k).collect();
        check_knn_against_brute_force(&points, &target, k, &results);
    }

    #[test]
    fn test_invariants_hold_under_interleaving(
        coords in prop::collection::vec(arb_point_2d(), 4..40),
        removal_picks in prop::collection::vec(0usize..1000, 0..20)
    ) {
        let points = points_2d_from_coords(&coords);
        let mut tree = MTree::new(MIN_CAPACITY, EuclideanDistance, MaxSpreadSplit).unwrap();
        let mut live: Vec<Point2D<i32>> = Vec::new();

        let mut removals = removal_picks.iter();
        for point in &points {
            tree.add(point.clone());
            live.push(point.clone());
            tree.check_invariants();

            if let Some(pick) = removals.next() {
                let victim = live.remove(pick % live.len());
                prop_assert!(tree.remove(&victim).is_ok());
                tree.check_invariants();
            }
        }
        prop_assert_eq!(tree.len(), live.len());
    }

    #[test]
    fn test_add_then_remove_restores_results(
        coords in prop::collection::vec(arb_point_2d(), 1..25),
        extra_coords in arb_point_2d(),
        target_coords in arb_point_2d()
    ) {
        let points = points_2d_from_coords(&coords);
        let target = Point2D::new(target_coords.0, target_coords.1, None);
        let mut tree = build_tree(&points);

        let before: Vec<(Point2D<i32>, f64)> = tree
            .knn_query(&target, 6)
            .map(|(p, d)| (p.clone(), d))
            .collect();

        let extra = Point2D::new(extra_coords.0, extra_coords.1, Some(-1));
        tree.add(extra.clone());
        prop_assert!(tree.remove(&extra).is_ok());
        tree.check_invariants();

        let after: Vec<(Point2D<i32>, f64)> = tree
            .knn_query(&target, 6)
            .map(|(p, d)| (p.clone(), d))
            .collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn test_ordered_extremes_strategy_agrees_with_brute_force(
        values in prop::collection::vec((0i64..200, 0i64..200), 1..30),
        k in 1usize..8
    ) {
        fn int_euclidean(a: &Vec<i64>, b: &Vec<i64>) -> f64 {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| ((x - y) * (x - y)) as f64)
                .sum::<f64>()
                .sqrt()
        }

        let points: Vec<Vec<i64>> = values.iter().map(|(x, y)| vec![*x, *y]).collect();
        let mut tree = MTree::new(MIN_CAPACITY, int_euclidean, OrderedExtremesSplit).unwrap();
        for point in &points {
            tree.add(point.clone());
            tree.check_invariants();
        }

        let query = vec![100i64, 100];
        let results: Vec<_> = tree.knn_query(&query, k).collect();
        prop_assert_eq!(results.len(), k.min(points.len()));

        let mut expected: Vec<f64> = points.iter().map(|p| int_euclidean(&query, p)).collect();
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let yielded: Vec<f64> = results.iter().map(|(_, d)| *d).collect();
        prop_assert_eq!(&yielded[..], &expected[..results.len()]);
    }
}
