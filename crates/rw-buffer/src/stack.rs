//! LIFO stack of borrowed handles.

use crate::alloc::allocation_failed;

/// Slots allocated when a stack is created with a zero size hint.
pub const DEFAULT_STACK_SIZE: usize = 8;

/// Stack of handles that it tracks but never owns.
///
/// Items are `Copy` handles (references, indices) so pushing and popping never
/// creates or destroys the referenced values. Capacity doubles when a push
/// finds the stack full.
#[derive(Clone, Debug)]
pub struct Stack<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Copy> Stack<T> {
    /// Create a stack with room for at least `hint` items (8 when `hint` is 0).
    #[must_use]
    pub fn new(hint: usize) -> Self {
        let mut stack = Self {
            items: Vec::new(),
            capacity: 0,
        };
        stack.grow(if hint == 0 { DEFAULT_STACK_SIZE } else { hint });
        stack
    }

    /// Grow the allocation to at least `size` slots. Never shrinks.
    pub fn grow(&mut self, size: usize) {
        if self.capacity >= size {
            return;
        }
        if self.items.try_reserve_exact(size - self.items.len()).is_err() {
            allocation_failed(size.saturating_mul(size_of::<T>()));
        }
        self.capacity = size;
    }

    /// Push a handle, doubling the capacity when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.grow(self.capacity * 2);
        }
        self.items.push(item);
    }

    /// Remove and return the top handle.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Return the top handle without removing it.
    pub fn top(&self) -> Option<T> {
        self.items.last().copied()
    }

    /// Drop every handle above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.items.truncate(depth);
    }

    /// Number of handles on the stack.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from the bottom of the stack to the top.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items.iter().copied()
    }
}

impl<T: Copy> Default for Stack<T> {
    fn default() -> Self {
        Self::new(0)
    }
}
