//! ## Distance Functions and Per-Operation Caching
//!
//! This module defines the `DistanceFunction` trait through which callers supply the metric of
//! their space, and `CachedDistance`, a memoizing wrapper that lives for the duration of a single
//! mutating operation. The metric must satisfy the usual axioms (non-negativity, identity of
//! indiscernibles, symmetry, triangle inequality); the tree relies on the triangle inequality for
//! all of its pruning.

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// A distance function over objects of type `T`.
///
/// Implemented by the metric types in [`crate::geometry`] and, via a blanket impl, by any
/// `Fn(&T, &T) -> f64` closure:
///
/// ```
/// use mtree::distance::DistanceFunction;
///
/// let metric = |a: &i64, b: &i64| (a - b).abs() as f64;
/// assert_eq!(metric.distance(&3, &10), 7.0);
/// ```
pub trait DistanceFunction<T> {
    /// Returns the distance between `a` and `b`.
    fn distance(&self, a: &T, b: &T) -> f64;
}

impl<T, F> DistanceFunction<T> for F
where
    F: Fn(&T, &T) -> f64,
{
    fn distance(&self, a: &T, b: &T) -> f64 {
        self(a, b)
    }
}

/// An unordered pair of objects, used as the cache key so that `d(a, b)` and `d(b, a)` share one
/// entry.
#[derive(Debug)]
struct PairKey<T>(T, T);

impl<T: PartialEq> PartialEq for PairKey<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.0 == other.0 && self.1 == other.1) || (self.0 == other.1 && self.1 == other.0)
    }
}

impl<T: Eq> Eq for PairKey<T> {}

impl<T: Hash> Hash for PairKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn element_hash<T: Hash>(value: &T) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        }
        // Combining with XOR keeps the hash independent of the pair order.
        state.write_u64(element_hash(&self.0) ^ element_hash(&self.1));
    }
}

/// A memoizing wrapper around a [`DistanceFunction`], scoped to a single tree operation.
///
/// Split promotion and partition evaluate the same pairs many times over; memoizing them turns
/// repeated metric calls into hash lookups. The cache is discarded when the operation finishes,
/// so stored objects may be mutated by the caller *between* operations without invalidating it.
#[derive(Debug)]
pub struct CachedDistance<'a, T, D> {
    function: &'a D,
    cache: HashMap<PairKey<T>, f64>,
    evaluations: usize,
}

impl<'a, T, D> CachedDistance<'a, T, D>
where
    T: Clone + Eq + Hash,
    D: DistanceFunction<T>,
{
    /// Creates an empty cache over the given distance function.
    pub fn new(function: &'a D) -> Self {
        CachedDistance {
            function,
            cache: HashMap::new(),
            evaluations: 0,
        }
    }

    /// Returns the distance between `a` and `b`, evaluating the underlying function at most once
    /// per unordered pair.
    pub fn distance(&mut self, a: &T, b: &T) -> f64 {
        match self.cache.entry(PairKey(a.clone(), b.clone())) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                self.evaluations += 1;
                *entry.insert(self.function.distance(a, b))
            }
        }
    }

    /// Returns how many times the underlying distance function has actually been evaluated.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(a: &Vec<i64>, b: &Vec<i64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| ((x - y) * (x - y)) as f64)
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_repeated_pairs_hit_the_cache() {
        let function = metric;
        let mut cached = CachedDistance::new(&function);
        let a = vec![0, 0];
        let b = vec![3, 4];
        assert_eq!(cached.distance(&a, &b), 5.0);
        assert_eq!(cached.distance(&a, &b), 5.0);
        assert_eq!(cached.evaluations(), 1);
    }

    #[test]
    fn test_symmetric_pairs_share_one_entry() {
        let function = metric;
        let mut cached = CachedDistance::new(&function);
        let a = vec![1, 1];
        let b = vec![4, 5];
        assert_eq!(cached.distance(&a, &b), 5.0);
        assert_eq!(cached.distance(&b, &a), 5.0);
        assert_eq!(cached.evaluations(), 1);
    }

    #[test]
    fn test_distinct_pairs_are_evaluated() {
        let function = metric;
        let mut cached = CachedDistance::new(&function);
        let points = vec![vec![0, 0], vec![1, 0], vec![2, 0]];
        for a in &points {
            for b in &points {
                cached.distance(a, b);
            }
        }
        // Three distinct unordered pairs plus the three self-distances.
        assert_eq!(cached.evaluations(), 6);
    }
}
