//! ## M-tree Implementation
//!
//! This module implements an M-tree, a dynamic balanced index for objects drawn from an
//! arbitrary metric space. The tree only interacts with stored objects through a user-supplied
//! [`DistanceFunction`], so anything with a metric can be indexed: points, strings under edit
//! distance, feature vectors, and so on. It supports insertion, deletion, range search, and
//! k-nearest neighbor (kNN) search, pruning subtrees with the triangle inequality via
//! precomputed covering radii and parent distances.
//!
//! Node overflow on insert is resolved by a split whose promotion and partition steps are
//! delegated to a pluggable [`SplitStrategy`]; node underflow on delete is repaired by
//! redistributing with or merging into the nearest sibling.
//!
//! # Examples
//!
//! ```
//! use mtree::geometry::{EuclideanDistance, Point2D};
//! use mtree::m_tree::MTree;
//! use mtree::split::MaxSpreadSplit;
//!
//! let mut tree = MTree::new(2, EuclideanDistance, MaxSpreadSplit).unwrap();
//!
//! let points: Vec<Point2D<&str>> = vec![
//!     Point2D::new(1.0, 2.0, Some("A")),
//!     Point2D::new(5.0, 1.0, Some("B")),
//!     Point2D::new(9.0, 9.0, Some("C")),
//! ];
//! for point in &points {
//!     tree.add(point.clone());
//! }
//!
//! let neighbors: Vec<_> = tree.knn_query(&Point2D::new(1.5, 2.0, None), 2).collect();
//! assert_eq!(neighbors.len(), 2);
//!
//! let in_range: Vec<_> = tree.range_query(&Point2D::new(1.5, 2.0, None), 4.0).collect();
//! assert!(in_range.iter().all(|(_, d)| *d <= 4.0));
//! ```

use crate::distance::{CachedDistance, DistanceFunction};
use crate::errors::MTreeError;
use crate::split::{Group, MaxSpreadSplit, SplitStrategy};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, info};

// Tolerance used by the invariant checker; covering radii are accumulated sums of distances and
// may drift from freshly computed ones by float rounding.
const RADIUS_SLACK: f64 = 1e-9;

/// An entry of a leaf node: one stored object.
#[derive(Debug)]
struct ObjectEntry<T> {
    data: T,
    distance_to_parent: Option<f64>,
}

/// An entry of an internal node: a routing object, its covering radius, and the subtree it owns.
#[derive(Debug)]
struct RoutingEntry<T> {
    data: T,
    distance_to_parent: Option<f64>,
    radius: f64,
    child: Box<Node<T>>,
}

impl<T> RoutingEntry<T> {
    fn over_leaf(half: SplitHalf<T, ObjectEntry<T>>) -> Self {
        RoutingEntry {
            data: half.promoted,
            distance_to_parent: None,
            radius: half.radius,
            child: Box::new(Node::Leaf(half.entries)),
        }
    }

    fn over_internal(half: SplitHalf<T, RoutingEntry<T>>) -> Self {
        RoutingEntry {
            data: half.promoted,
            distance_to_parent: None,
            radius: half.radius,
            child: Box::new(Node::Internal(half.entries)),
        }
    }
}

/// A node in the M-tree.
#[derive(Debug)]
enum Node<T> {
    Leaf(Vec<ObjectEntry<T>>),
    Internal(Vec<RoutingEntry<T>>),
}

/// Uniform view over both entry kinds, used by the shared split code.
trait SubtreeEntry<T> {
    fn data(&self) -> &T;
    fn covering_radius(&self) -> f64;
    fn set_distance_to_parent(&mut self, value: Option<f64>);
}

impl<T> SubtreeEntry<T> for ObjectEntry<T> {
    fn data(&self) -> &T {
        &self.data
    }

    fn covering_radius(&self) -> f64 {
        0.0
    }

    fn set_distance_to_parent(&mut self, value: Option<f64>) {
        self.distance_to_parent = value;
    }
}

impl<T> SubtreeEntry<T> for RoutingEntry<T> {
    fn data(&self) -> &T {
        &self.data
    }

    fn covering_radius(&self) -> f64 {
        self.radius
    }

    fn set_distance_to_parent(&mut self, value: Option<f64>) {
        self.distance_to_parent = value;
    }
}

/// One side of a completed split: the promoted routing object, the covering radius of the group,
/// and the entries assigned to it (with freshly stamped parent distances).
struct SplitHalf<T, E> {
    promoted: T,
    radius: f64,
    entries: Vec<E>,
}

/// State shared by one mutating operation: the per-operation distance cache, the split strategy,
/// and the capacity bounds.
struct OpContext<'a, T, D, S> {
    distance: CachedDistance<'a, T, D>,
    split: &'a S,
    min_capacity: usize,
    max_capacity: usize,
}

/// Runs the configured strategy over an overfull (or recombined) entry set and distributes the
/// entries into two halves, computing each half's covering radius.
fn split_entries<T, E, D, S>(
    entries: Vec<E>,
    ctx: &mut OpContext<'_, T, D, S>,
) -> (SplitHalf<T, E>, SplitHalf<T, E>)
where
    T: Clone + Eq + Hash + fmt::Debug,
    E: SubtreeEntry<T>,
    D: DistanceFunction<T>,
    S: SplitStrategy<T>,
{
    let (first, second, groups) = {
        let items: Vec<&T> = entries.iter().map(|entry| entry.data()).collect();
        let (first, second) = ctx.split.promote(&items, &mut ctx.distance);
        let groups = ctx.split.partition(&items, first, second, &mut ctx.distance);
        (first, second, groups)
    };
    let mut halves = (
        SplitHalf {
            promoted: entries[first].data().clone(),
            radius: 0.0,
            entries: Vec::new(),
        },
        SplitHalf {
            promoted: entries[second].data().clone(),
            radius: 0.0,
            entries: Vec::new(),
        },
    );
    for (mut entry, group) in entries.into_iter().zip(groups) {
        let half = match group {
            Group::First => &mut halves.0,
            Group::Second => &mut halves.1,
        };
        let d = ctx.distance.distance(entry.data(), &half.promoted);
        entry.set_distance_to_parent(Some(d));
        half.radius = half.radius.max(d + entry.covering_radius());
        half.entries.push(entry);
    }
    halves
}

impl<T> Node<T>
where
    T: Clone + Eq + Hash + fmt::Debug,
{
    fn size(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Internal(entries) => entries.len(),
        }
    }

    /// Moves the node out, leaving an empty husk behind.
    fn take_node(&mut self) -> Node<T> {
        std::mem::replace(self, Node::Leaf(Vec::new()))
    }

    /// Smallest covering radius justified by the stored parent distances of this node's entries.
    fn coverage_demand(&self) -> f64 {
        match self {
            Node::Leaf(entries) => entries
                .iter()
                .map(|entry| entry.distance_to_parent.unwrap_or(0.0))
                .fold(0.0, f64::max),
            Node::Internal(entries) => entries
                .iter()
                .map(|entry| entry.distance_to_parent.unwrap_or(0.0) + entry.radius)
                .fold(0.0, f64::max),
        }
    }

    fn clear_parent_distances(&mut self) {
        match self {
            Node::Leaf(entries) => {
                for entry in entries {
                    entry.distance_to_parent = None;
                }
            }
            Node::Internal(entries) => {
                for entry in entries {
                    entry.distance_to_parent = None;
                }
            }
        }
    }

    /// Installs `data` somewhere under this node. Returns the two replacement routing entries if
    /// this node had to split; their `distance_to_parent` is left unset for the caller to stamp.
    fn add<D, S>(
        &mut self,
        data: T,
        distance_to_parent: Option<f64>,
        parent: Option<&T>,
        ctx: &mut OpContext<'_, T, D, S>,
    ) -> Option<(RoutingEntry<T>, RoutingEntry<T>)>
    where
        D: DistanceFunction<T>,
        S: SplitStrategy<T>,
    {
        match self {
            Node::Leaf(entries) => {
                entries.push(ObjectEntry {
                    data,
                    distance_to_parent,
                });
            }
            Node::Internal(entries) => {
                // Routing rule: prefer the closest entry already covering the object; otherwise
                // take the entry whose radius needs the least expansion, and expand it.
                let mut covering: Option<(usize, f64)> = None;
                let mut expansion: Option<(usize, f64, f64)> = None;
                for (idx, entry) in entries.iter().enumerate() {
                    let d = ctx.distance.distance(&data, &entry.data);
                    if d <= entry.radius {
                        if covering.map_or(true, |(_, best)| d < best) {
                            covering = Some((idx, d));
                        }
                    } else if covering.is_none() {
                        let gap = d - entry.radius;
                        if expansion.map_or(true, |(_, _, best)| gap < best) {
                            expansion = Some((idx, d, gap));
                        }
                    }
                }
                let (idx, d) = match covering {
                    Some(choice) => choice,
                    None => {
                        let (idx, d, _) =
                            expansion.expect("an internal node holds at least one entry");
                        debug!("expanding covering radius of routing entry {} to {}", idx, d);
                        entries[idx].radius = d;
                        (idx, d)
                    }
                };
                let split = {
                    let RoutingEntry {
                        data: route, child, ..
                    } = &mut entries[idx];
                    child.add(data, Some(d), Some(&*route), ctx)
                };
                if let Some((mut first, mut second)) = split {
                    debug!("replacing routing entry {} after child split", idx);
                    if let Some(parent_data) = parent {
                        first.distance_to_parent =
                            Some(ctx.distance.distance(&first.data, parent_data));
                        second.distance_to_parent =
                            Some(ctx.distance.distance(&second.data, parent_data));
                    }
                    entries.remove(idx);
                    entries.push(first);
                    entries.push(second);
                }
            }
        }
        if self.size() > ctx.max_capacity {
            Some(self.split(ctx))
        } else {
            None
        }
    }

    /// Splits this overfull node into two siblings, consuming its entries.
    fn split<D, S>(&mut self, ctx: &mut OpContext<'_, T, D, S>) -> (RoutingEntry<T>, RoutingEntry<T>)
    where
        D: DistanceFunction<T>,
        S: SplitStrategy<T>,
    {
        debug!("splitting node with {} entries", self.size());
        match self {
            Node::Leaf(entries) => {
                let (first, second) = split_entries(std::mem::take(entries), ctx);
                (
                    RoutingEntry::over_leaf(first),
                    RoutingEntry::over_leaf(second),
                )
            }
            Node::Internal(entries) => {
                let (first, second) = split_entries(std::mem::take(entries), ctx);
                (
                    RoutingEntry::over_internal(first),
                    RoutingEntry::over_internal(second),
                )
            }
        }
    }

    /// Deletes one entry matching `data` from this subtree. Returns whether a match was found;
    /// underflow of this node itself is left for the caller to observe and repair.
    fn remove<D, S>(
        &mut self,
        data: &T,
        distance_to_parent: Option<f64>,
        parent: Option<&T>,
        ctx: &mut OpContext<'_, T, D, S>,
    ) -> bool
    where
        D: DistanceFunction<T>,
        S: SplitStrategy<T>,
    {
        match self {
            Node::Leaf(entries) => match entries.iter().position(|entry| entry.data == *data) {
                Some(idx) => {
                    entries.remove(idx);
                    true
                }
                None => false,
            },
            Node::Internal(entries) => {
                let mut removed_at = None;
                for idx in 0..entries.len() {
                    let d = {
                        let entry = &entries[idx];
                        // Triangle filter on stored parent distances first, metric call second.
                        if let (Some(dp), Some(dtp)) =
                            (distance_to_parent, entry.distance_to_parent)
                        {
                            if (dp - dtp).abs() > entry.radius {
                                continue;
                            }
                        }
                        let d = ctx.distance.distance(data, &entry.data);
                        if d > entry.radius {
                            continue;
                        }
                        d
                    };
                    let RoutingEntry {
                        data: route, child, ..
                    } = &mut entries[idx];
                    if child.remove(data, Some(d), Some(&*route), ctx) {
                        removed_at = Some(idx);
                        break;
                    }
                }
                let Some(idx) = removed_at else {
                    return false;
                };
                if entries[idx].child.size() < ctx.min_capacity {
                    Self::rebalance(entries, idx, parent, ctx);
                }
                true
            }
        }
    }

    /// Repairs the underflowing child at `idx` with entries from its nearest sibling: a full
    /// re-split when the donor can spare entries, a merge into the underflowing slot otherwise.
    fn rebalance<D, S>(
        entries: &mut Vec<RoutingEntry<T>>,
        idx: usize,
        parent: Option<&T>,
        ctx: &mut OpContext<'_, T, D, S>,
    ) where
        D: DistanceFunction<T>,
        S: SplitStrategy<T>,
    {
        let mut donor: Option<usize> = None;
        let mut best = f64::INFINITY;
        for other in 0..entries.len() {
            if other == idx {
                continue;
            }
            if let (Some(a), Some(b)) = (
                entries[idx].distance_to_parent,
                entries[other].distance_to_parent,
            ) {
                // The triangle lower bound already rules this sibling out.
                if (a - b).abs() >= best {
                    continue;
                }
            }
            let d = ctx.distance.distance(&entries[idx].data, &entries[other].data);
            if d < best {
                best = d;
                donor = Some(other);
            }
        }
        let donor = donor.expect("an underflowing child always has a sibling");

        if entries[donor].child.size() > ctx.min_capacity {
            debug!("redistributing entries of child {} with donor {}", idx, donor);
            let donor_node = entries[donor].child.take_node();
            let under_node = entries[idx].child.take_node();
            let (mut first, mut second) = match (under_node, donor_node) {
                (Node::Leaf(mut under), Node::Leaf(from)) => {
                    under.extend(from);
                    let (first, second) = split_entries(under, ctx);
                    (
                        RoutingEntry::over_leaf(first),
                        RoutingEntry::over_leaf(second),
                    )
                }
                (Node::Internal(mut under), Node::Internal(from)) => {
                    under.extend(from);
                    let (first, second) = split_entries(under, ctx);
                    (
                        RoutingEntry::over_internal(first),
                        RoutingEntry::over_internal(second),
                    )
                }
                _ => unreachable!("sibling nodes share a level"),
            };
            if let Some(parent_data) = parent {
                first.distance_to_parent = Some(ctx.distance.distance(&first.data, parent_data));
                second.distance_to_parent = Some(ctx.distance.distance(&second.data, parent_data));
            }
            entries[idx] = first;
            entries[donor] = second;
        } else {
            debug!("merging donor {} into underflowing child {}", donor, idx);
            let removed = entries.remove(donor);
            let idx = if donor < idx { idx - 1 } else { idx };
            let anchor = entries[idx].data.clone();
            match (entries[idx].child.as_mut(), *removed.child) {
                (Node::Leaf(into), Node::Leaf(from)) => {
                    for mut entry in from {
                        entry.distance_to_parent =
                            Some(ctx.distance.distance(&entry.data, &anchor));
                        into.push(entry);
                    }
                }
                (Node::Internal(into), Node::Internal(from)) => {
                    for mut entry in from {
                        entry.distance_to_parent =
                            Some(ctx.distance.distance(&entry.data, &anchor));
                        into.push(entry);
                    }
                }
                _ => unreachable!("sibling nodes share a level"),
            }
            entries[idx].radius = entries[idx].child.coverage_demand();
        }
    }
}

/// M-tree for similarity search over an arbitrary metric space.
///
/// # Type Parameters
///
/// * `T`: The stored object type; compared by value and only otherwise touched through `D`.
/// * `D`: The distance function, satisfying the metric axioms.
/// * `S`: The split strategy consulted on node overflow and redistribution.
#[derive(Debug)]
pub struct MTree<T, D, S = MaxSpreadSplit> {
    root: Option<Box<Node<T>>>,
    min_capacity: usize,
    max_capacity: usize,
    distance: D,
    split: S,
    len: usize,
}

impl<T, D, S> MTree<T, D, S>
where
    T: Clone + Eq + Hash + fmt::Debug,
    D: DistanceFunction<T>,
    S: SplitStrategy<T>,
{
    /// Creates a new `MTree` with the given minimum node capacity and a maximum of twice that.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::InvalidCapacity` if `min_capacity` is less than 2.
    pub fn new(min_capacity: usize, distance: D, split: S) -> Result<Self, MTreeError> {
        Self::with_max_capacity(min_capacity, 2 * min_capacity, distance, split)
    }

    /// Creates a new `MTree` with explicit capacity bounds.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::InvalidCapacity` if `min_capacity` is less than 2 or `max_capacity`
    /// is less than `2 * min_capacity` (the latter guarantees that merging two minimal siblings
    /// always fits in one node).
    pub fn with_max_capacity(
        min_capacity: usize,
        max_capacity: usize,
        distance: D,
        split: S,
    ) -> Result<Self, MTreeError> {
        if min_capacity < 2 || max_capacity < 2 * min_capacity {
            return Err(MTreeError::InvalidCapacity {
                min_capacity,
                max_capacity,
            });
        }
        info!(
            "Creating new MTree with min_capacity: {} and max_capacity: {}",
            min_capacity, max_capacity
        );
        Ok(MTree {
            root: None,
            min_capacity,
            max_capacity,
            distance,
            split,
            len: 0,
        })
    }

    /// Inserts an object into the tree.
    ///
    /// Objects are stored by value; adding an object equal to one already present creates a
    /// second entry.
    pub fn add(&mut self, data: T) {
        info!("Inserting object into MTree: {:?}", data);
        let mut ctx = OpContext {
            distance: CachedDistance::new(&self.distance),
            split: &self.split,
            min_capacity: self.min_capacity,
            max_capacity: self.max_capacity,
        };
        match &mut self.root {
            None => {
                self.root = Some(Box::new(Node::Leaf(vec![ObjectEntry {
                    data,
                    distance_to_parent: None,
                }])));
            }
            Some(root) => {
                if let Some((first, second)) = root.add(data, None, None, &mut ctx) {
                    debug!("root split; the tree grows one level");
                    **root = Node::Internal(vec![first, second]);
                }
            }
        }
        self.len += 1;
    }

    /// Removes one entry matching the given object.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::DataNotFound` if no entry matches; the tree is left unchanged.
    pub fn remove(&mut self, data: &T) -> Result<(), MTreeError> {
        info!("Removing object from MTree: {:?}", data);
        let mut ctx = OpContext {
            distance: CachedDistance::new(&self.distance),
            split: &self.split,
            min_capacity: self.min_capacity,
            max_capacity: self.max_capacity,
        };
        let root = self.root.as_deref_mut().ok_or(MTreeError::DataNotFound)?;
        if !root.remove(data, None, None, &mut ctx) {
            return Err(MTreeError::DataNotFound);
        }
        self.len -= 1;

        let emptied = matches!(&*root, Node::Leaf(entries) if entries.is_empty());
        let lone_child = matches!(&*root, Node::Internal(entries) if entries.len() == 1);
        if emptied {
            debug!("last object removed; the tree is now empty");
            self.root = None;
        } else if lone_child {
            debug!("root is down to a single child; the tree shrinks one level");
            let old_root = self.root.take().expect("root exists");
            let Node::Internal(mut entries) = *old_root else {
                unreachable!("only an internal root can shrink");
            };
            let sole = entries.pop().expect("root holds exactly one entry");
            let mut child = *sole.child;
            child.clear_parent_distances();
            self.root = Some(Box::new(child));
        }
        Ok(())
    }

    /// Returns a lazy iterator over all stored objects within `radius` of `query`, as
    /// `(object, distance)` pairs in non-decreasing distance order.
    ///
    /// The iterator is single-pass: traversal state is consumed as results are pulled.
    pub fn range_query(&self, query: &T, radius: f64) -> RangeQuery<'_, T, D> {
        info!("Performing range query with radius {}", radius);
        let mut pending = BinaryHeap::new();
        if let Some(root) = self.root.as_deref() {
            pending.push(PendingSubtree {
                bound: OrderedFloat(0.0),
                routing_distance: None,
                node: root,
            });
        }
        RangeQuery {
            distance: &self.distance,
            query: query.clone(),
            radius,
            pending,
            nearest: BinaryHeap::new(),
        }
    }

    /// Returns an iterator over the `k` stored objects nearest to `query`, as
    /// `(object, distance)` pairs in non-decreasing distance order.
    ///
    /// Fewer than `k` results are returned when the tree holds fewer than `k` objects. Among
    /// objects tied at the k-th distance, which ones are returned is unspecified.
    pub fn knn_query(&self, query: &T, k: usize) -> KnnQuery<'_, T> {
        info!("Performing kNN query with k = {}", k);
        let mut hits: BinaryHeap<Hit<'_, T>> = BinaryHeap::new();
        if k > 0 {
            let mut candidates: BinaryHeap<PendingSubtree<'_, T>> = BinaryHeap::new();
            if let Some(root) = self.root.as_deref() {
                candidates.push(PendingSubtree {
                    bound: OrderedFloat(0.0),
                    routing_distance: None,
                    node: root,
                });
            }
            while let Some(subtree) = candidates.pop() {
                let limit = Self::knn_limit(&hits, k);
                if subtree.bound.into_inner() > limit {
                    break;
                }
                match subtree.node {
                    Node::Leaf(entries) => {
                        for entry in entries {
                            let limit = Self::knn_limit(&hits, k);
                            if let (Some(dq), Some(dtp)) =
                                (subtree.routing_distance, entry.distance_to_parent)
                            {
                                if (dq - dtp).abs() > limit {
                                    continue;
                                }
                            }
                            let d = self.distance.distance(query, &entry.data);
                            if hits.len() < k {
                                hits.push(Hit {
                                    distance: OrderedFloat(d),
                                    data: &entry.data,
                                });
                            } else if d < limit {
                                hits.pop();
                                hits.push(Hit {
                                    distance: OrderedFloat(d),
                                    data: &entry.data,
                                });
                            }
                        }
                    }
                    Node::Internal(entries) => {
                        for entry in entries {
                            let limit = Self::knn_limit(&hits, k);
                            if let (Some(dq), Some(dtp)) =
                                (subtree.routing_distance, entry.distance_to_parent)
                            {
                                if (dq - dtp).abs() > limit + entry.radius {
                                    continue;
                                }
                            }
                            let d = self.distance.distance(query, &entry.data);
                            if d > limit + entry.radius {
                                continue;
                            }
                            let bound = (d - entry.radius).max(0.0);
                            if hits.len() < k || bound <= limit {
                                candidates.push(PendingSubtree {
                                    bound: OrderedFloat(bound),
                                    routing_distance: Some(d),
                                    node: &*entry.child,
                                });
                            }
                        }
                    }
                }
            }
        }
        let results: Vec<(&T, f64)> = hits
            .into_sorted_vec()
            .into_iter()
            .map(|hit| (hit.data, hit.distance.into_inner()))
            .collect();
        KnnQuery {
            results: results.into_iter(),
        }
    }

    /// Current k-th nearest distance, or infinity while the result heap is not yet full.
    fn knn_limit(hits: &BinaryHeap<Hit<'_, T>>, k: usize) -> f64 {
        if hits.len() < k {
            f64::INFINITY
        } else {
            hits.peek()
                .map(|hit| hit.distance.into_inner())
                .unwrap_or(f64::INFINITY)
        }
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the minimum node capacity.
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    /// Returns the maximum node capacity.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Checks the structural invariants of the tree, panicking on the first violation.
    ///
    /// Verified: capacity bounds of every node, equal depth of all leaves, stored parent
    /// distances matching the metric, and covering radii bounding every leaf descendant. A
    /// violation indicates a bug in the tree or in a custom split strategy, never a data
    /// condition.
    pub fn check_invariants(&self) {
        let Some(root) = self.root.as_deref() else {
            assert_eq!(self.len, 0, "an empty tree must hold no objects");
            return;
        };
        assert!(root.size() >= 1, "a non-empty tree has a non-empty root");
        let mut leaf_depths = Vec::new();
        let objects = self.collect_and_check(root, None, true, 0, &mut leaf_depths);
        assert_eq!(
            objects.len(),
            self.len,
            "stored entry count must match len()"
        );
        assert!(
            leaf_depths.windows(2).all(|pair| pair[0] == pair[1]),
            "all leaves must lie at the same depth: {:?}",
            leaf_depths
        );
    }

    fn collect_and_check<'s>(
        &'s self,
        node: &'s Node<T>,
        parent: Option<&T>,
        is_root: bool,
        depth: usize,
        leaf_depths: &mut Vec<usize>,
    ) -> Vec<&'s T> {
        if !is_root {
            assert!(
                node.size() >= self.min_capacity,
                "non-root node underflows: {} < {}",
                node.size(),
                self.min_capacity
            );
        }
        assert!(
            node.size() <= self.max_capacity,
            "node overflows: {} > {}",
            node.size(),
            self.max_capacity
        );
        match node {
            Node::Leaf(entries) => {
                leaf_depths.push(depth);
                for entry in entries {
                    self.check_parent_distance(&entry.data, entry.distance_to_parent, parent);
                }
                entries.iter().map(|entry| &entry.data).collect()
            }
            Node::Internal(entries) => {
                let mut objects = Vec::new();
                for entry in entries {
                    self.check_parent_distance(&entry.data, entry.distance_to_parent, parent);
                    let descendants = self.collect_and_check(
                        &entry.child,
                        Some(&entry.data),
                        false,
                        depth + 1,
                        leaf_depths,
                    );
                    for object in &descendants {
                        let d = self.distance.distance(&entry.data, object);
                        assert!(
                            d <= entry.radius + RADIUS_SLACK,
                            "covering radius violated: {} > {}",
                            d,
                            entry.radius
                        );
                    }
                    objects.extend(descendants);
                }
                objects
            }
        }
    }

    fn check_parent_distance(&self, data: &T, stored: Option<f64>, parent: Option<&T>) {
        match parent {
            None => assert!(
                stored.is_none(),
                "entries of the root must not store a parent distance"
            ),
            Some(parent_data) => {
                let expected = self.distance.distance(data, parent_data);
                let stored = stored.expect("non-root entries must store a parent distance");
                assert!(
                    (stored - expected).abs() <= RADIUS_SLACK,
                    "stale parent distance: stored {}, expected {}",
                    stored,
                    expected
                );
            }
        }
    }
}

/// A subtree queued for best-first traversal, ordered by its lower-bound distance to the query.
#[derive(Debug)]
struct PendingSubtree<'a, T> {
    bound: OrderedFloat<f64>,
    /// Distance from the query to this subtree's routing object, for the triangle prefilter.
    /// `None` for the root, which has no routing object.
    routing_distance: Option<f64>,
    node: &'a Node<T>,
}

impl<T> PartialEq for PendingSubtree<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.bound == other.bound
    }
}

impl<T> Eq for PendingSubtree<'_, T> {}

impl<T> Ord for PendingSubtree<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the smallest lower bound first.
        other.bound.cmp(&self.bound)
    }
}

impl<T> PartialOrd for PendingSubtree<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A confirmed leaf hit held in the bounded kNN result heap; the heap top is the farthest
/// accepted result.
#[derive(Debug)]
struct Hit<'a, T> {
    distance: OrderedFloat<f64>,
    data: &'a T,
}

impl<T> PartialEq for Hit<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl<T> Eq for Hit<'_, T> {}

impl<T> Ord for Hit<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.cmp(&other.distance)
    }
}

impl<T> PartialOrd for Hit<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A result waiting to be yielded by a range query, ordered by ascending distance.
#[derive(Debug)]
struct PendingResult<'a, T> {
    distance: OrderedFloat<f64>,
    data: &'a T,
}

impl<T> PartialEq for PendingResult<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl<T> Eq for PendingResult<'_, T> {}

impl<T> Ord for PendingResult<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the smallest distance first.
        other.distance.cmp(&self.distance)
    }
}

impl<T> PartialOrd for PendingResult<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy best-first range query iterator returned by [`MTree::range_query`].
///
/// A result is yielded only once its distance is no larger than the lower bound of every
/// unexplored subtree, which is what guarantees the non-decreasing output order.
#[derive(Debug)]
pub struct RangeQuery<'a, T, D> {
    distance: &'a D,
    query: T,
    radius: f64,
    pending: BinaryHeap<PendingSubtree<'a, T>>,
    nearest: BinaryHeap<PendingResult<'a, T>>,
}

impl<'a, T, D> RangeQuery<'a, T, D>
where
    D: DistanceFunction<T>,
{
    fn visit(&mut self, subtree: PendingSubtree<'a, T>) {
        match subtree.node {
            Node::Leaf(entries) => {
                for entry in entries {
                    if let (Some(dq), Some(dtp)) =
                        (subtree.routing_distance, entry.distance_to_parent)
                    {
                        if (dq - dtp).abs() > self.radius {
                            continue;
                        }
                    }
                    let d = self.distance.distance(&self.query, &entry.data);
                    if d <= self.radius {
                        self.nearest.push(PendingResult {
                            distance: OrderedFloat(d),
                            data: &entry.data,
                        });
                    }
                }
            }
            Node::Internal(entries) => {
                for entry in entries {
                    if let (Some(dq), Some(dtp)) =
                        (subtree.routing_distance, entry.distance_to_parent)
                    {
                        if (dq - dtp).abs() > self.radius + entry.radius {
                            continue;
                        }
                    }
                    let d = self.distance.distance(&self.query, &entry.data);
                    if d > self.radius + entry.radius {
                        continue;
                    }
                    let bound = (d - entry.radius).max(0.0);
                    self.pending.push(PendingSubtree {
                        bound: OrderedFloat(bound),
                        routing_distance: Some(d),
                        node: &*entry.child,
                    });
                }
            }
        }
    }
}

impl<'a, T, D> Iterator for RangeQuery<'a, T, D>
where
    D: DistanceFunction<T>,
{
    type Item = (&'a T, f64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let expand = match (self.nearest.peek(), self.pending.peek()) {
                (None, None) => return None,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some(hit), Some(subtree)) => hit.distance > subtree.bound,
            };
            if expand {
                let subtree = self.pending.pop().expect("a pending subtree is present");
                self.visit(subtree);
            } else {
                let hit = self.nearest.pop().expect("a pending result is present");
                return Some((hit.data, hit.distance.into_inner()));
            }
        }
    }
}

/// Iterator over kNN results returned by [`MTree::knn_query`], ascending by distance.
#[derive(Debug)]
pub struct KnnQuery<'a, T> {
    results: std::vec::IntoIter<(&'a T, f64)>,
}

impl<'a, T> Iterator for KnnQuery<'a, T> {
    type Item = (&'a T, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.results.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.results.size_hint()
    }
}
