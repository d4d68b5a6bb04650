//! ## Geometric Types
//!
//! This module provides the point types and ready-made metrics that the rest of the crate is
//! commonly used with. The tree itself is generic over the stored object type and only talks to
//! it through a [`DistanceFunction`](crate::distance::DistanceFunction), so these helpers are a
//! convenience, not a requirement.
//!
//! Point coordinates are `f64` and must not be NaN: points are hashed and compared by value so
//! they can serve as cache keys and removal targets.

use crate::distance::DistanceFunction;
use ordered_float::OrderedFloat;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A 2D point with an optional data payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point2D<T> {
    pub x: f64,
    pub y: f64,
    pub data: Option<T>,
}

impl<T> Point2D<T> {
    pub fn new(x: f64, y: f64, data: Option<T>) -> Self {
        Point2D { x, y, data }
    }

    /// Returns the Euclidean distance to another point.
    pub fn distance(&self, other: &Point2D<T>) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl<T: Eq> Eq for Point2D<T> {}

impl<T: Hash> Hash for Point2D<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // OrderedFloat canonicalizes -0.0, keeping the hash consistent with `==`.
        OrderedFloat(self.x).hash(state);
        OrderedFloat(self.y).hash(state);
        self.data.hash(state);
    }
}

/// A 3D point with an optional data payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point3D<T> {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub data: Option<T>,
}

impl<T> Point3D<T> {
    pub fn new(x: f64, y: f64, z: f64, data: Option<T>) -> Self {
        Point3D { x, y, z, data }
    }

    /// Returns the Euclidean distance to another point.
    pub fn distance(&self, other: &Point3D<T>) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

impl<T: Eq> Eq for Point3D<T> {}

impl<T: Hash> Hash for Point3D<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        OrderedFloat(self.x).hash(state);
        OrderedFloat(self.y).hash(state);
        OrderedFloat(self.z).hash(state);
        self.data.hash(state);
    }
}

/// The Euclidean (L2) metric over [`Point2D`] and [`Point3D`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EuclideanDistance;

impl<T> DistanceFunction<Point2D<T>> for EuclideanDistance {
    fn distance(&self, a: &Point2D<T>, b: &Point2D<T>) -> f64 {
        a.distance(b)
    }
}

impl<T> DistanceFunction<Point3D<T>> for EuclideanDistance {
    fn distance(&self, a: &Point3D<T>, b: &Point3D<T>) -> f64 {
        a.distance(b)
    }
}

/// The Manhattan (L1) metric over [`Point2D`] and [`Point3D`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ManhattanDistance;

impl<T> DistanceFunction<Point2D<T>> for ManhattanDistance {
    fn distance(&self, a: &Point2D<T>, b: &Point2D<T>) -> f64 {
        (a.x - b.x).abs() + (a.y - b.y).abs()
    }
}

impl<T> DistanceFunction<Point3D<T>> for ManhattanDistance {
    fn distance(&self, a: &Point3D<T>, b: &Point3D<T>) -> f64 {
        (a.x - b.x).abs() + (a.y - b.y).abs() + (a.z - b.z).abs()
    }
}
