//! Fixed-capacity ring buffer with an explicit write cursor
//!
//! Once full, each insert overwrites the slot under the cursor and advances
//! it, so the slot written longest ago is always the next to go.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRing<T>")]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    cursor: usize,
    capacity: usize,
}

/// On-disk shape; fields are repaired before they back a live buffer
#[derive(Deserialize)]
struct StoredRing<T> {
    slots: Vec<T>,
    #[serde(default)]
    cursor: usize,
    #[serde(default)]
    capacity: usize,
}

impl<T> From<StoredRing<T>> for RingBuffer<T> {
    fn from(stored: StoredRing<T>) -> Self {
        let StoredRing {
            mut slots,
            cursor,
            capacity,
        } = stored;
        let capacity = capacity.max(1);
        slots.truncate(capacity);
        let cursor = if slots.len() < capacity {
            slots.len()
        } else {
            cursor % capacity
        };
        Self {
            slots,
            cursor,
            capacity,
        }
    }
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Insert an item, returning the one it overwrote (if any)
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            self.cursor = self.slots.len() % self.capacity;
            return None;
        }

        let evicted = std::mem::replace(&mut self.slots[self.cursor], item);
        self.cursor = (self.cursor + 1) % self.capacity;
        Some(evicted)
    }

    /// Find the first item matching `pred`
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<&T> {
        self.slots.iter().find(|item| pred(item))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot the next insert will overwrite once the buffer is full
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_before_overwriting() {
        let mut ring = RingBuffer::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.cursor(), 0);
    }

    #[test]
    fn overwrites_oldest_insert_first() {
        let mut ring = RingBuffer::new(3);
        for i in 1..=3 {
            ring.push(i);
        }

        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.push(5), Some(2));
        assert_eq!(ring.cursor(), 2);

        let items: Vec<_> = ring.iter().copied().collect();
        assert_eq!(items, vec![4, 5, 3]);
    }

    #[test]
    fn cursor_wraps_around() {
        let mut ring = RingBuffer::new(2);
        for i in 0..7 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 2);
        assert!(ring.find(|v| *v == 6).is_some());
        assert!(ring.find(|v| *v == 5).is_some());
        assert!(ring.find(|v| *v == 4).is_none());
    }

    #[test]
    fn stored_cursor_past_capacity_is_wrapped() {
        let mut ring: RingBuffer<u32> =
            serde_json::from_str(r#"{"slots":[1,2],"cursor":7,"capacity":2}"#).unwrap();
        assert_eq!(ring.cursor(), 1);
        assert_eq!(ring.push(3), Some(2));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn stored_slots_beyond_capacity_are_dropped() {
        let mut ring: RingBuffer<u32> =
            serde_json::from_str(r#"{"slots":[1,2,3,4],"cursor":0,"capacity":2}"#).unwrap();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.push(5), Some(1));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn stored_zero_capacity_is_usable() {
        let mut ring: RingBuffer<u32> =
            serde_json::from_str(r#"{"slots":[],"cursor":3,"capacity":0}"#).unwrap();
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), Some(1));
    }

    #[test]
    fn stored_partial_ring_appends() {
        let mut ring: RingBuffer<u32> =
            serde_json::from_str(r#"{"slots":[1],"cursor":5,"capacity":3}"#).unwrap();
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert_eq!(ring.push(4), Some(1));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut ring = RingBuffer::new(0);
        ring.push("a");
        assert_eq!(ring.push("b"), Some("a"));
        assert_eq!(ring.capacity(), 1);
    }
}
