//! Per-resource availability, per-process holdings mirror, and FIFO wait
//! queues (spec §3, §4.C).
//!
//! The wait queue is a fixed-capacity ring buffer of slot indices. A
//! waiter satisfied mid-scan is replaced in place by a sentinel hole
//! (`None`) rather than physically removed, so the re-allocation pass in
//! the dispatcher can keep scanning past it without shifting the rest of
//! the queue (spec §9: "Ring-buffer wait queue with sentinel holes").

use crate::process_table::Slot;

/// FIFO ring buffer of waiter slots for a single resource class.
#[derive(Debug)]
pub struct WaitQueue {
    buf: Vec<Option<Slot>>,
    head: usize,
    len: usize,
}

impl WaitQueue {
    fn new(capacity: usize) -> Self {
        WaitQueue {
            buf: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_len() == 0
    }

    /// Number of entries still representing a live waiter (excludes holes).
    pub fn active_len(&self) -> usize {
        (0..self.len)
            .filter(|i| self.buf[(self.head + i) % self.capacity()].is_some())
            .count()
    }

    /// Append a waiter at the tail.
    pub fn enqueue(&mut self, slot: Slot) {
        assert!(self.len < self.capacity(), "wait queue overflow");
        let tail = (self.head + self.len) % self.capacity();
        self.buf[tail] = Some(slot);
        self.len += 1;
    }

    /// Whether `slot` currently appears (not as a sentinel) in this queue.
    pub fn contains(&self, slot: Slot) -> bool {
        (0..self.len).any(|i| self.buf[(self.head + i) % self.capacity()] == Some(slot))
    }

    /// Run the re-allocation pass: visit every live waiter from head to
    /// tail in FIFO order, calling `try_grant(slot)`. A `true` return
    /// replaces that entry with a sentinel hole. After the full scan,
    /// the head pointer is advanced past any leading holes (spec §4.F:
    /// "continue scan even past partially-satisfied waiters").
    pub fn reallocate(&mut self, mut try_grant: impl FnMut(Slot) -> bool) {
        for i in 0..self.len {
            let idx = (self.head + i) % self.capacity();
            if let Some(slot) = self.buf[idx] {
                if try_grant(slot) {
                    self.buf[idx] = None;
                }
            }
        }
        while self.len > 0 && self.buf[self.head].is_none() {
            self.head = (self.head + 1) % self.capacity();
            self.len -= 1;
        }
    }

    /// Iterate live waiters in FIFO order without mutating the queue.
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        (0..self.len).filter_map(move |i| self.buf[(self.head + i) % self.capacity()])
    }
}

/// Per-resource-class descriptor.
pub struct ResourceDescriptor {
    pub total: u32,
    pub available: u32,
    pub held_by: Vec<u32>,
    pub wait_queue: WaitQueue,
}

impl ResourceDescriptor {
    fn new(total: u32, slots: usize) -> Self {
        ResourceDescriptor {
            total,
            available: total,
            held_by: vec![0; slots],
            wait_queue: WaitQueue::new(slots),
        }
    }
}

pub struct ResourceTable {
    pub resources: Vec<ResourceDescriptor>,
}

impl ResourceTable {
    pub fn new(resource_count: usize, instances: u32, slots: usize) -> Self {
        ResourceTable {
            resources: (0..resource_count)
                .map(|_| ResourceDescriptor::new(instances, slots))
                .collect(),
        }
    }

    /// Grant `q` units of resource `r` to `slot` if immediately available.
    /// Updates `available` and the `held_by` mirror; returns whether the
    /// grant happened.
    pub fn try_allocate(&mut self, slot: Slot, r: usize, q: u32) -> bool {
        let res = &mut self.resources[r];
        if q <= res.available {
            res.available -= q;
            res.held_by[slot] += q;
            true
        } else {
            false
        }
    }

    /// Release every unit of resource `r` held by `slot`, returning the
    /// amount released. A no-op release (nothing held) leaves all state
    /// unchanged (law L1).
    pub fn release_all(&mut self, slot: Slot, r: usize) -> u32 {
        let res = &mut self.resources[r];
        let amount = res.held_by[slot];
        if amount > 0 {
            res.held_by[slot] = 0;
            res.available += amount;
        }
        amount
    }

    pub fn enqueue_waiter(&mut self, slot: Slot, r: usize) {
        self.resources[r].wait_queue.enqueue(slot);
    }

    pub fn held(&self, slot: Slot, r: usize) -> u32 {
        self.resources[r].held_by[slot]
    }

    pub fn available(&self, r: usize) -> u32 {
        self.resources[r].available
    }

    /// Clear a slot's holdings across every resource, for victim
    /// termination or normal reap; returns the amounts released per
    /// resource class.
    pub fn release_all_resources(&mut self, slot: Slot) -> Vec<u32> {
        (0..self.resources.len())
            .map(|r| self.release_all(slot, r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_decrements_available_and_mirrors_holding() {
        let mut t = ResourceTable::new(1, 10, 4);
        assert!(t.try_allocate(0, 0, 3));
        assert_eq!(t.available(0), 7);
        assert_eq!(t.held(0, 0), 3);
    }

    #[test]
    fn allocate_fails_when_insufficient() {
        let mut t = ResourceTable::new(1, 10, 4);
        assert!(t.try_allocate(0, 0, 10));
        assert!(!t.try_allocate(1, 0, 1));
        assert_eq!(t.available(0), 0);
    }

    #[test]
    fn release_all_returns_units_and_resets_holding() {
        let mut t = ResourceTable::new(1, 10, 4);
        t.try_allocate(0, 0, 4);
        let released = t.release_all(0, 0);
        assert_eq!(released, 4);
        assert_eq!(t.available(0), 10);
        assert_eq!(t.held(0, 0), 0);
    }

    #[test]
    fn no_op_release_leaves_state_unchanged() {
        let mut t = ResourceTable::new(1, 10, 4);
        t.try_allocate(1, 0, 5);
        let before = t.available(0);
        let released = t.release_all(0, 0);
        assert_eq!(released, 0);
        assert_eq!(t.available(0), before);
    }

    #[test]
    fn wait_queue_fifo_order_preserved() {
        let mut q = WaitQueue::new(4);
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn wait_queue_reallocate_skips_infeasible_and_leaves_head_holes_handled() {
        let mut q = WaitQueue::new(4);
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        // Only slot 2 is grantable.
        q.reallocate(|slot| slot == 2);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(!q.contains(2));
    }

    #[test]
    fn wait_queue_head_advances_past_satisfied_leading_entries() {
        let mut q = WaitQueue::new(4);
        q.enqueue(1);
        q.enqueue(2);
        q.reallocate(|slot| slot == 1);
        // Head-of-line entry satisfied; head should skip its hole.
        assert_eq!(q.active_len(), 1);
        q.enqueue(3);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn wait_queue_wraps_around_ring_buffer() {
        let mut q = WaitQueue::new(3);
        q.enqueue(1);
        q.enqueue(2);
        q.reallocate(|slot| slot == 1);
        q.enqueue(3);
        q.enqueue(4);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    proptest::proptest! {
        /// Invariant P1: available plus every slot's holdings always sums
        /// back to the resource's total, across any sequence of
        /// allocate/release calls a single-resource descriptor can see.
        #[test]
        fn available_plus_holdings_always_equals_total(
            ops in proptest::collection::vec((0usize..4, 0u32..6), 0..30)
        ) {
            let mut t = ResourceTable::new(1, 10, 4);
            for (slot, amount) in ops {
                if amount > 0 {
                    t.try_allocate(slot, 0, amount);
                } else {
                    t.release_all(slot, 0);
                }
                let held_sum: u32 = (0..4).map(|s| t.held(s, 0)).sum();
                proptest::prop_assert_eq!(t.available(0) + held_sum, 10);
            }
        }
    }
}
