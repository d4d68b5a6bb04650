use anyhow::Result;
use mtree::geometry::{EuclideanDistance, Point2D};
use mtree::m_tree::MTree;
use mtree::split::MaxSpreadSplit;

fn main() -> Result<()> {
    println!("{}", "=".repeat(100));
    println!("M-tree Example");

    // Create an M-tree with a minimum node capacity of 2 (maximum defaults to 4).
    let mut tree = MTree::new(2, EuclideanDistance, MaxSpreadSplit)?;

    tree.add(Point2D::new(11.0, 11.0, Some("A")));
    tree.add(Point2D::new(51.0, 51.0, Some("B")));
    tree.add(Point2D::new(31.0, 41.0, Some("C")));
    tree.add(Point2D::new(71.0, 81.0, Some("D")));
    tree.add(Point2D::new(81.0, 91.0, Some("E")));
    tree.add(Point2D::new(21.0, 21.0, Some("F")));

    // K-Nearest Neighbors query.
    let target = Point2D::new(35.0, 45.0, None);
    println!("Nearest neighbors of ({}, {}):", target.x, target.y);
    for (point, distance) in tree.knn_query(&target, 2) {
        println!("  ({}, {}) -> {:?} at distance {:.2}", point.x, point.y, point.data, distance);
    }

    // Range query; results stream lazily in increasing distance.
    let center = Point2D::new(20.0, 20.0, None);
    let radius = 30.0;
    println!("Objects within {} of ({}, {}):", radius, center.x, center.y);
    for (point, distance) in tree.range_query(&center, radius) {
        println!("  ({}, {}) -> {:?} at distance {:.2}", point.x, point.y, point.data, distance);
    }

    // Removal.
    tree.remove(&Point2D::new(21.0, 21.0, Some("F")))?;
    println!("Objects stored after removal: {}", tree.len());

    Ok(())
}
