//! Fixed-capacity drop pool: recycles drops instead of allocating per match.

use crate::error::BoardError;
use crate::grid::{self, DropId, Position};
use crate::token::TokenKind;
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of pool tags; every pool gets its own so ids never collide across pools.
static NEXT_POOL_TAG: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
pub struct DropPool {
    tag: u32,
    capacity: usize,
    /// Inactive drops ready for reuse.
    free: Vec<grid::Drop>,
    /// active[slot] is true while the drop in that slot is handed out.
    active: Vec<bool>,
    active_count: usize,
}

impl DropPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            tag: NEXT_POOL_TAG.fetch_add(1, Ordering::Relaxed),
            capacity,
            free: Vec::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
            active_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Hand out a recycled drop, or a fresh one while below capacity.
    pub fn acquire(&mut self, kind: TokenKind, position: Position) -> Result<grid::Drop, BoardError> {
        let drop = if let Some(mut d) = self.free.pop() {
            d.reset(kind, position);
            d
        } else if self.active.len() < self.capacity {
            let id = DropId::new(self.tag, self.active.len() as u32);
            self.active.push(false);
            grid::Drop::new(id, kind, position)
        } else {
            return Err(BoardError::PoolExhausted {
                capacity: self.capacity,
            });
        };
        self.active[drop.id().slot as usize] = true;
        self.active_count += 1;
        Ok(drop)
    }

    /// Return a drop. Fails for drops this pool did not hand out, or already took back.
    pub fn release(&mut self, mut drop: grid::Drop) -> Result<(), BoardError> {
        let id = drop.id();
        if id.pool != self.tag {
            return Err(BoardError::InvalidRelease { id });
        }
        match self.active.get_mut(id.slot as usize) {
            Some(slot) if *slot => *slot = false,
            _ => return Err(BoardError::InvalidRelease { id }),
        }
        self.active_count -= 1;
        drop.clear_matched();
        self.free.push(drop);
        Ok(())
    }
}
