//! Deep clean: raw message-id ranges that bypass search.
//!
//! The search index can miss messages after leaving and rejoining a group, so
//! a caller may queue a contiguous id range directly. Some of those ids may not
//! exist or may belong to other members; the delete call skips or rejects them.

/// Every id in the half-open range `start_id..end_id`. Empty when `start_id >= end_id`.
pub fn inject(start_id: i32, end_id: i32) -> Vec<i32> {
    if start_id >= end_id {
        return Vec::new();
    }
    (start_id..end_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeletionBatch;

    #[test]
    fn range_is_half_open() {
        let mut batch = DeletionBatch::new();
        batch.merge(inject(1000, 1010));
        assert_eq!(batch.ids(), (1000..=1009).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn inverted_or_empty_range_is_noop() {
        assert!(inject(10, 10).is_empty());
        assert!(inject(20, 10).is_empty());
    }

    #[test]
    fn injecting_twice_yields_same_set() {
        let mut once = DeletionBatch::new();
        once.merge([3, 1005]);
        once.merge(inject(1000, 1010));

        let mut twice = once.clone();
        assert_eq!(twice.merge(inject(1000, 1010)), 0);
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 11);
    }
}
