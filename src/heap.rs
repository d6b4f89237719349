//! Backtrackable term memory.
//!
//! The heap is a bump-allocated arena of term cells addressed by [`Addr`].
//! Cells are never freed individually; a choice point rollback resets the
//! heap top and replays the trail to restore older cells.
//!
//! # Trailing
//! Creating a choice point moves the *barrier* to the current heap top. A cell
//! below the barrier that is rewritten afterwards has its previous value
//! pushed onto the trail the first time it changes within that choice point's
//! epoch. Cells above the barrier were allocated after the choice point and
//! are simply discarded on rollback.
//!
//! # Determinism
//! - Addresses grow monotonically between rollbacks.
//! - Choice points must be committed or rolled back in LIFO order.

use crate::error::{Arena, EngineError};
use crate::term::{Addr, Term};

/// Snapshot taken when a choice point is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoicePoint {
    /// Heap top at creation.
    pub heap_top: usize,
    /// Trail length at creation.
    pub trail_top: usize,
    /// Barrier in force before this choice point.
    pub barrier: usize,
    /// Goal stack fail continuation in force before this choice point.
    pub fail_continuation: usize,
    /// Trailing epoch in force before this choice point.
    epoch: u32,
}

#[derive(Debug, Clone)]
struct TrailEntry {
    addr: Addr,
    previous: Term,
}

/// Heap cells, trail and barrier.
#[derive(Debug, Clone)]
pub struct Heap {
    cells: Vec<Term>,
    /// Epoch in which each cell was last trailed.
    stamps: Vec<u32>,
    capacity: usize,
    trail: Vec<TrailEntry>,
    trail_capacity: usize,
    barrier: usize,
    epoch: u32,
    next_epoch: u32,
}

impl Heap {
    /// Creates an empty heap with the given fixed capacities.
    pub fn new(capacity: usize, trail_capacity: usize) -> Self {
        Self {
            cells: Vec::new(),
            stamps: Vec::new(),
            capacity,
            trail: Vec::new(),
            trail_capacity,
            barrier: 0,
            epoch: 0,
            next_epoch: 1,
        }
    }

    /// Allocates a fresh unbound variable.
    pub fn allocate(&mut self) -> Result<Term, EngineError> {
        if self.cells.len() >= self.capacity {
            return Err(EngineError::CapacityExceeded {
                arena: Arena::Heap,
                capacity: self.capacity,
            });
        }
        let addr = Addr::new(self.cells.len() as u32);
        self.cells.push(Term::Var(addr));
        self.stamps.push(0);
        Ok(Term::Var(addr))
    }

    /// Returns the raw contents of a cell.
    pub fn cell(&self, addr: Addr) -> Result<&Term, EngineError> {
        self.cells
            .get(addr.index())
            .ok_or(EngineError::InvalidAddress(addr))
    }

    /// Overwrites a cell, trailing its previous contents when it predates the barrier.
    pub fn bind(&mut self, addr: Addr, value: Term) -> Result<(), EngineError> {
        let idx = addr.index();
        if idx >= self.cells.len() {
            return Err(EngineError::InvalidAddress(addr));
        }
        if idx < self.barrier && self.stamps[idx] != self.epoch {
            if self.trail.len() >= self.trail_capacity {
                return Err(EngineError::CapacityExceeded {
                    arena: Arena::Trail,
                    capacity: self.trail_capacity,
                });
            }
            let previous = std::mem::replace(&mut self.cells[idx], value);
            self.trail.push(TrailEntry { addr, previous });
            self.stamps[idx] = self.epoch;
            return Ok(());
        }
        self.cells[idx] = value;
        Ok(())
    }

    /// Snapshots the heap and moves the barrier to the current top.
    ///
    /// `fail_continuation` is the goal stack continuation to restore when the
    /// choice point is resolved.
    pub fn create_choice_point(&mut self, fail_continuation: usize) -> ChoicePoint {
        let cp = ChoicePoint {
            heap_top: self.cells.len(),
            trail_top: self.trail.len(),
            barrier: self.barrier,
            fail_continuation,
            epoch: self.epoch,
        };
        self.barrier = self.cells.len();
        self.epoch = self.next_epoch;
        self.next_epoch += 1;
        cp
    }

    /// Undoes every binding made since `cp` and discards newer cells.
    pub fn rollback(&mut self, cp: &ChoicePoint) -> Result<(), EngineError> {
        if cp.trail_top > self.trail.len() || cp.heap_top > self.cells.len() {
            return Err(EngineError::ChoicePointOrder);
        }
        while self.trail.len() > cp.trail_top {
            if let Some(entry) = self.trail.pop() {
                self.cells[entry.addr.index()] = entry.previous;
            }
        }
        self.cells.truncate(cp.heap_top);
        self.stamps.truncate(cp.heap_top);
        self.barrier = cp.barrier;
        self.epoch = cp.epoch;
        Ok(())
    }

    /// Keeps the bindings made since `cp` and reinstates the older barrier.
    ///
    /// Trail entries recorded since `cp` stay in place when they cover cells
    /// below the older barrier, so that an enclosing choice point can still
    /// undo them; the rest are dropped.
    pub fn commit(&mut self, cp: &ChoicePoint) {
        if cp.trail_top < self.trail.len() {
            let recent = self.trail.split_off(cp.trail_top);
            self.trail.extend(
                recent
                    .into_iter()
                    .filter(|entry| entry.addr.index() < cp.barrier),
            );
        }
        self.barrier = cp.barrier;
        self.epoch = cp.epoch;
    }

    /// Forgets every outstanding choice point, keeping all cells as they are.
    ///
    /// Used to recover after a fatal error aborted resolution mid-way.
    pub(crate) fn discard_choice_points(&mut self) {
        self.trail.clear();
        self.barrier = 0;
        self.epoch = 0;
        self.stamps.iter_mut().for_each(|s| *s = 0);
    }

    /// Number of allocated cells.
    pub fn top(&self) -> usize {
        self.cells.len()
    }

    pub fn barrier(&self) -> usize {
        self.barrier
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr_of(term: &Term) -> Addr {
        match term {
            Term::Var(a) => *a,
            other => panic!("expected variable, got {other}"),
        }
    }

    #[test]
    fn allocate_creates_self_references() {
        let mut heap = Heap::new(4, 4);
        let v = heap.allocate().unwrap();
        let a = addr_of(&v);
        assert_eq!(heap.cell(a).unwrap(), &Term::Var(a));
        assert_eq!(heap.top(), 1);
    }

    #[test]
    fn heap_exhaustion_is_typed() {
        let mut heap = Heap::new(1, 4);
        heap.allocate().unwrap();
        assert_eq!(
            heap.allocate(),
            Err(EngineError::CapacityExceeded {
                arena: Arena::Heap,
                capacity: 1
            })
        );
    }

    #[test]
    fn bindings_above_barrier_are_not_trailed() {
        let mut heap = Heap::new(8, 8);
        let cp = heap.create_choice_point(0);
        let v = heap.allocate().unwrap();
        heap.bind(addr_of(&v), Term::int(1)).unwrap();
        assert_eq!(heap.trail_len(), 0);
        heap.rollback(&cp).unwrap();
        assert_eq!(heap.top(), 0);
    }

    #[test]
    fn old_cells_are_trailed_once_per_epoch() {
        let mut heap = Heap::new(8, 8);
        let v = heap.allocate().unwrap();
        let a = addr_of(&v);
        let cp = heap.create_choice_point(0);
        heap.bind(a, Term::int(1)).unwrap();
        heap.bind(a, Term::int(2)).unwrap();
        assert_eq!(heap.trail_len(), 1);
        heap.rollback(&cp).unwrap();
        assert_eq!(heap.cell(a).unwrap(), &Term::Var(a));
        assert_eq!(heap.trail_len(), 0);
    }

    #[test]
    fn nested_rollback_after_commit_restores_outer_state() {
        let mut heap = Heap::new(8, 8);
        let x = addr_of(&heap.allocate().unwrap());
        let outer = heap.create_choice_point(0);
        let y = addr_of(&heap.allocate().unwrap());
        let inner = heap.create_choice_point(0);
        heap.bind(x, Term::int(1)).unwrap();
        heap.bind(y, Term::int(2)).unwrap();
        heap.commit(&inner);
        assert_eq!(heap.barrier(), 1);
        // `y` is newer than the outer choice point; only `x` stays trailed.
        assert_eq!(heap.trail_len(), 1);
        heap.bind(x, Term::int(3)).unwrap();
        heap.rollback(&outer).unwrap();
        assert_eq!(heap.cell(x).unwrap(), &Term::Var(x));
        assert_eq!(heap.top(), 1);
    }

    #[test]
    fn trail_exhaustion_is_typed() {
        let mut heap = Heap::new(8, 1);
        let x = addr_of(&heap.allocate().unwrap());
        let y = addr_of(&heap.allocate().unwrap());
        heap.create_choice_point(0);
        heap.bind(x, Term::int(1)).unwrap();
        assert!(matches!(
            heap.bind(y, Term::int(1)),
            Err(EngineError::CapacityExceeded {
                arena: Arena::Trail,
                ..
            })
        ));
    }

    #[test]
    fn out_of_order_rollback_is_rejected() {
        let mut heap = Heap::new(8, 8);
        let outer = heap.create_choice_point(0);
        heap.allocate().unwrap();
        let inner = heap.create_choice_point(0);
        heap.rollback(&outer).unwrap();
        assert_eq!(heap.rollback(&inner), Err(EngineError::ChoicePointOrder));
    }
}
