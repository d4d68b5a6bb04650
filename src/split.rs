//! ## Split Strategies
//!
//! When a node overflows, the tree asks a split strategy to *promote* two routing objects out of
//! the overfull entry set and to *partition* the set around them. Strategies only ever see the
//! objects and a cached distance function; covering radii and parent distances are recomputed by
//! the tree itself.
//!
//! The provided `partition` is a balanced generalized-hyperplane assignment: the unassigned item
//! nearest to the first promoted object and the one nearest to the second are granted
//! alternately, so the two groups never differ in size by more than one. Both split halves
//! therefore respect the minimum node capacity whenever the input holds at least twice that many
//! entries, which is guaranteed by the capacity bounds checked at construction.

use crate::distance::{CachedDistance, DistanceFunction};
use std::hash::Hash;

/// The side of a split an entry is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    First,
    Second,
}

/// A promotion and partition policy consumed by the tree on node overflow.
///
/// `promote` returns the *indices* of the two promoted objects, which keeps the contract honest:
/// promoted routing objects are always drawn from the overfull set itself.
pub trait SplitStrategy<T: Clone + Eq + Hash> {
    /// Picks two distinct promoted routing objects from `items`, as a pair of indices.
    fn promote<D: DistanceFunction<T>>(
        &self,
        items: &[&T],
        distance: &mut CachedDistance<'_, T, D>,
    ) -> (usize, usize);

    /// Assigns every item to one of the two groups. `items[first]` belongs to [`Group::First`]
    /// and `items[second]` to [`Group::Second`].
    fn partition<D: DistanceFunction<T>>(
        &self,
        items: &[&T],
        first: usize,
        second: usize,
        distance: &mut CachedDistance<'_, T, D>,
    ) -> Vec<Group> {
        let to_first: Vec<f64> = items
            .iter()
            .map(|item| distance.distance(item, items[first]))
            .collect();
        let to_second: Vec<f64> = items
            .iter()
            .map(|item| distance.distance(item, items[second]))
            .collect();

        let mut groups: Vec<Option<Group>> = vec![None; items.len()];
        groups[first] = Some(Group::First);
        groups[second] = Some(Group::Second);

        let mut remaining: Vec<usize> = (0..items.len())
            .filter(|&idx| idx != first && idx != second)
            .collect();
        let mut turn = Group::First;
        while !remaining.is_empty() {
            let by = match turn {
                Group::First => &to_first,
                Group::Second => &to_second,
            };
            let mut best = 0;
            for candidate in 1..remaining.len() {
                if by[remaining[candidate]] < by[remaining[best]] {
                    best = candidate;
                }
            }
            groups[remaining.remove(best)] = Some(turn);
            turn = match turn {
                Group::First => Group::Second,
                Group::Second => Group::First,
            };
        }

        groups
            .into_iter()
            .map(|group| group.expect("every item is assigned to a group"))
            .collect()
    }
}

/// Promotes the pair of objects farthest from each other.
///
/// This is the crate default: it spreads the two new routing objects apart, which tends to keep
/// the resulting covering balls small. Ties are broken by scan order.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxSpreadSplit;

impl<T: Clone + Eq + Hash> SplitStrategy<T> for MaxSpreadSplit {
    fn promote<D: DistanceFunction<T>>(
        &self,
        items: &[&T],
        distance: &mut CachedDistance<'_, T, D>,
    ) -> (usize, usize) {
        let mut promoted = (0, 1);
        let mut spread = f64::NEG_INFINITY;
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let d = distance.distance(items[i], items[j]);
                if d > spread {
                    spread = d;
                    promoted = (i, j);
                }
            }
        }
        promoted
    }
}

/// Promotes the minimum and maximum objects under the total order of `T`.
///
/// This promotion ignores the metric entirely; it is only useful where bit-for-bit reproducible
/// tree shapes matter more than query performance.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedExtremesSplit;

impl<T: Clone + Eq + Hash + Ord> SplitStrategy<T> for OrderedExtremesSplit {
    fn promote<D: DistanceFunction<T>>(
        &self,
        items: &[&T],
        _distance: &mut CachedDistance<'_, T, D>,
    ) -> (usize, usize) {
        let mut min = 0;
        let mut max = 0;
        for idx in 1..items.len() {
            if items[idx] < items[min] {
                min = idx;
            }
            if items[idx] >= items[max] {
                max = idx;
            }
        }
        if min == max {
            // All items compare equal; any distinct pair of slots will do.
            max = if min == 0 { 1 } else { 0 };
        }
        (min, max)
    }
}
