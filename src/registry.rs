//! The ordered handler queue.
//!
//! Slot `N` serves the `N`-th request (zero-based) and nothing else. The
//! queue never advances a cursor: the dispatcher derives the slot from how
//! many requests it has recorded, so a slot stays addressable after it has
//! been served and can be inspected or replaced at any time.

use std::sync::Arc;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, Wrapped};

#[derive(Default)]
pub struct HandlerQueue {
    slots: Vec<BoxedHandler>,
}

impl HandlerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Adds a handler to the end of the queue.
    pub fn append(&mut self, handler: impl Handler) {
        self.slots.push(handler.into_boxed_handler());
    }

    /// Adds handlers to the end of the queue, keeping their order.
    pub fn extend(&mut self, handlers: impl IntoIterator<Item = BoxedHandler>) {
        self.slots.extend(handlers);
    }

    /// Replaces the handler at `index`.
    ///
    /// `index == len()` fills the next free slot. Anything further out is
    /// rejected rather than leaving a gap.
    pub fn set(&mut self, index: usize, handler: impl Handler) -> Result<(), Error> {
        let handler = handler.into_boxed_handler();
        match index.cmp(&self.slots.len()) {
            std::cmp::Ordering::Less => self.slots[index] = handler,
            std::cmp::Ordering::Equal => self.slots.push(handler),
            std::cmp::Ordering::Greater => return Err(self.out_of_range(index)),
        }
        Ok(())
    }

    /// The handler currently at `index`.
    pub fn get(&self, index: usize) -> Result<BoxedHandler, Error> {
        self.slots
            .get(index)
            .map(Arc::clone)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Replaces the handler at `index` with one that runs `extra` and then
    /// the handler that was there before.
    pub fn wrap(&mut self, index: usize, extra: impl Handler) -> Result<(), Error> {
        let inner = self.get(index)?;
        self.slots[index] = Arc::new(Wrapped::new(extra.into_boxed_handler(), inner));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::HandlerIndex { index, len: self.slots.len() }
    }
}
