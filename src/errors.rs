//! ## Custom Errors for the M-tree
//!
//! This module defines the errors returned by the public tree operations.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents errors specific to invalid operations or parameters on an M-tree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq)]
pub enum MTreeError {
    /// Occurs when the node capacity bounds passed at construction are invalid.
    InvalidCapacity {
        /// The minimum node capacity that was requested.
        min_capacity: usize,
        /// The maximum node capacity that was requested.
        max_capacity: usize,
    },
    /// Occurs when a removal finds no entry matching the given object.
    DataNotFound,
}

impl fmt::Display for MTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MTreeError::InvalidCapacity {
                min_capacity,
                max_capacity,
            } => {
                write!(
                    f,
                    "Invalid capacity: min {min_capacity}, max {max_capacity}. The minimum \
                     capacity must be at least 2 and the maximum at least twice the minimum."
                )
            }
            MTreeError::DataNotFound => {
                write!(f, "No entry matching the given object was found in the tree.")
            }
        }
    }
}

impl Error for MTreeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_capacity_display() {
        let err = MTreeError::InvalidCapacity {
            min_capacity: 1,
            max_capacity: 2,
        };
        assert_eq!(
            format!("{}", err),
            "Invalid capacity: min 1, max 2. The minimum capacity must be at least 2 and the \
             maximum at least twice the minimum."
        );
    }

    #[test]
    fn test_data_not_found_display() {
        let err = MTreeError::DataNotFound;
        assert_eq!(
            format!("{}", err),
            "No entry matching the given object was found in the tree."
        );
    }
}
