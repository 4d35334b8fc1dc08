//! Ordered queue backing the scheduler's pending work.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Dispatch order of an [`OrderedQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    /// First in, first out.
    #[default]
    Fifo,
    /// Last in, first out.
    Lifo,
}

impl std::fmt::Display for QueueOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueOrder::Fifo => write!(f, "fifo"),
            QueueOrder::Lifo => write!(f, "lifo"),
        }
    }
}

/// A FIFO queue or LIFO stack with out-of-order inspection.
///
/// Items are kept in dispatch order: index 0 is always the item the next
/// [`pop`](Self::pop) returns. FIFO appends at the back, LIFO prepends at the
/// front.
#[derive(Debug, Clone)]
pub struct OrderedQueue<T> {
    items: VecDeque<T>,
    order: QueueOrder,
}

impl<T> OrderedQueue<T> {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            items: VecDeque::new(),
            order,
        }
    }

    pub fn fifo() -> Self {
        Self::new(QueueOrder::Fifo)
    }

    pub fn lifo() -> Self {
        Self::new(QueueOrder::Lifo)
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }

    /// Add an item and return the dispatch position it took.
    pub fn push(&mut self, item: T) -> usize {
        match self.order {
            QueueOrder::Fifo => {
                self.items.push_back(item);
                self.items.len() - 1
            }
            QueueOrder::Lifo => {
                self.items.push_front(item);
                0
            }
        }
    }

    /// Push every item in iteration order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
    }

    /// Remove the next item to dispatch.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// The next item to dispatch, without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn find_many(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<&T> {
        self.items.iter().filter(|item| predicate(item)).collect()
    }

    pub fn find_index(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().position(|item| predicate(item))
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Remove the item at a dispatch position.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.items.remove(index)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        Self::fifo()
    }
}
