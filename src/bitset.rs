//! Bit Set
//!
//! Child markers over the rows of a node, nominal value masks and forbidden column sets are
//! [`FixedBitSet`]s. The few operations used here that the crate doesn't offer directly.
use fixedbitset::FixedBitSet;

/// Set able to hold indices `0..len` with exactly `indices` set.
pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> FixedBitSet {
    let mut set = FixedBitSet::with_capacity(len);
    for i in indices {
        set.insert(i);
    }
    set
}

/// Number of indices set in both `a` and `b`.
pub fn intersection_count(a: &FixedBitSet, b: &FixedBitSet) -> usize {
    a.intersection(b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_indices() {
        let s = from_indices(130, [0, 64, 129]);
        assert_eq!(s.len(), 130);
        assert_eq!(s.count_ones(..), 3);
        assert!(s.contains(64));
        assert!(!s.contains(65));
        assert!(!s.contains(500));
        assert_eq!(s.ones().collect::<Vec<_>>(), vec![0, 64, 129]);
    }

    #[test]
    fn test_intersection_count() {
        let a = from_indices(10, [1, 2, 3]);
        let b = from_indices(10, [3, 4]);
        assert_eq!(intersection_count(&a, &b), 1);
        assert_eq!(intersection_count(&a, &FixedBitSet::with_capacity(10)), 0);
    }
}
