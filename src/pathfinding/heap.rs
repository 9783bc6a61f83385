use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Binary min-heap keyed by an arbitrary `Ord` priority.
///
/// Shared by every search in the crate (cluster A*, tile A*, corridor A*,
/// D* Lite and the flow-field frontier). Only the priority takes part in the
/// ordering, so the payload needs no `Ord` impl. Callers that need
/// reproducible tie-breaking append a coordinate to the priority tuple.
pub struct MinHeap<P: Ord, T> {
    heap: BinaryHeap<HeapEntry<P, T>>,
}

struct HeapEntry<P, T> {
    priority: P,
    item: T,
}

impl<P: Ord, T> PartialEq for HeapEntry<P, T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl<P: Ord, T> Eq for HeapEntry<P, T> {}

impl<P: Ord, T> PartialOrd for HeapEntry<P, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Ord, T> Ord for HeapEntry<P, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other.priority.cmp(&self.priority)
    }
}

impl<P: Ord, T> Default for MinHeap<P, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Ord, T> MinHeap<P, T> {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { heap: BinaryHeap::with_capacity(capacity) }
    }

    #[inline]
    pub fn push(&mut self, priority: P, item: T) {
        self.heap.push(HeapEntry { priority, item });
    }

    #[inline]
    pub fn pop(&mut self) -> Option<(P, T)> {
        self.heap.pop().map(|e| (e.priority, e.item))
    }

    #[inline]
    pub fn peek(&self) -> Option<(&P, &T)> {
        self.heap.peek().map(|e| (&e.priority, &e.item))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_ascending_priority() {
        let mut heap = MinHeap::new();
        for (p, name) in [(5, "e"), (1, "a"), (3, "c"), (2, "b"), (4, "d")] {
            heap.push(p, name);
        }
        assert_eq!(heap.peek().map(|(p, _)| *p), Some(1));
        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|(_, n)| n)).collect();
        assert_eq!(order, ["a", "b", "c", "d", "e"]);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_tuple_priorities_break_ties_deterministically() {
        let mut heap = MinHeap::new();
        heap.push((1, 9), ());
        heap.push((1, 2), ());
        heap.push((0, 50), ());
        assert_eq!(heap.pop().map(|(p, _)| p), Some((0, 50)));
        assert_eq!(heap.pop().map(|(p, _)| p), Some((1, 2)));
        assert_eq!(heap.pop().map(|(p, _)| p), Some((1, 9)));
    }
}
