use std::collections::VecDeque;

/// Bounded FIFO: appending past `retention` evicts the single oldest entry
/// in the same call, so the length never exceeds the bound.
#[derive(Debug, Clone)]
pub struct RingWindow<T> {
    items: VecDeque<T>,
    retention: usize,
}

impl<T> RingWindow<T> {
    /// `retention` is clamped to at least 1.
    pub fn new(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            items: VecDeque::with_capacity(retention + 1),
            retention,
        }
    }

    pub fn append(&mut self, item: T) {
        self.items.push_back(item);
        if self.items.len() > self.retention {
            self.items.pop_front();
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut T> {
        self.items.back_mut()
    }

    pub fn second_to_last(&self) -> Option<&T> {
        let len = self.items.len();
        if len < 2 {
            return None;
        }
        self.items.get(len - 2)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
