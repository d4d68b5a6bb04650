//! Serialization tests for the geometry types (requires the `serde` feature).

use mtree::geometry::{EuclideanDistance, Point2D, Point3D};
use mtree::m_tree::MTree;
use mtree::split::MaxSpreadSplit;

#[test]
fn test_point_2d_roundtrip() {
    let point = Point2D::new(1.5, -2.25, Some("A".to_string()));
    let bytes = bincode::serialize(&point).expect("serialization should succeed");
    let restored: Point2D<String> =
        bincode::deserialize(&bytes).expect("deserialization should succeed");
    assert_eq!(point, restored);
}

#[test]
fn test_point_3d_roundtrip() {
    let point = Point3D::new(1.0, 2.0, 3.0, Some(7i32));
    let bytes = bincode::serialize(&point).expect("serialization should succeed");
    let restored: Point3D<i32> =
        bincode::deserialize(&bytes).expect("deserialization should succeed");
    assert_eq!(point, restored);
}

#[test]
fn test_tree_built_from_deserialized_points() {
    let points: Vec<Point2D<i32>> = (0..20)
        .map(|i| Point2D::new(i as f64, (i * 3 % 7) as f64, Some(i)))
        .collect();
    let bytes = bincode::serialize(&points).expect("serialization should succeed");
    let restored: Vec<Point2D<i32>> =
        bincode::deserialize(&bytes).expect("deserialization should succeed");

    let mut tree = MTree::new(2, EuclideanDistance, MaxSpreadSplit).unwrap();
    for point in &restored {
        tree.add(point.clone());
    }
    tree.check_invariants();

    let query = Point2D::new(10.0, 3.0, None);
    let nearest: Vec<_> = tree.knn_query(&query, 1).collect();
    assert_eq!(nearest.len(), 1);
}
