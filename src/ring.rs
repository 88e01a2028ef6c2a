//! Cross-context SPSC ring queues (C9): bounded single-producer /
//! single-consumer buffers handing dequeued TX packets and committed RX
//! frames from the interrupt-context slot executor to the foreground.
//!
//! Exposes the reserve-then-publish split the original `ringbufindex`
//! provides (`peek_put` / `put`, `peek_get` / `get`) rather than a single
//! atomic enqueue, because the RX sub-procedure must reserve a slot,
//! leave it unwritten across a busy-wait window, and only commit it on a
//! valid reception (I5). Protected by `critical_section::Mutex` rather
//! than raw atomics: not every embedded target guarantees lock-free CAS,
//! and every access here is already a short, bounded critical section.

use core::cell::RefCell;
use critical_section::Mutex;

struct RingInner<T, const N: usize> {
    slots: [Option<T>; N],
    put_ptr: usize,
    get_ptr: usize,
}

/// A bounded SPSC ring over `T`, capacity `N` (need not be a power of two).
pub struct Ring<T, const N: usize> {
    inner: Mutex<RefCell<RingInner<T, N>>>,
}

impl<T, const N: usize> Ring<T, N> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(RingInner {
                slots: core::array::from_fn(|_| None),
                put_ptr: 0,
                get_ptr: 0,
            })),
        }
    }

    fn elements(inner: &RingInner<T, N>) -> usize {
        inner.put_ptr.wrapping_sub(inner.get_ptr)
    }

    /// Reserve the next write slot without publishing it (`ringbufindex_peek_put`).
    /// Returns `None` if the ring is full.
    pub fn peek_put(&self) -> Option<usize> {
        critical_section::with(|cs| {
            let inner = self.inner.borrow_ref(cs);
            if Self::elements(&inner) >= N {
                None
            } else {
                Some(inner.put_ptr % N)
            }
        })
    }

    /// Write a value into a slot reserved by `peek_put`. Does not publish it.
    pub fn write(&self, index: usize, value: T) {
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).slots[index] = Some(value);
        });
    }

    /// Publish the most recently reserved slot (`ringbufindex_put`).
    /// Returns `false` if the ring filled between `peek_put` and `commit_put`.
    pub fn commit_put(&self) -> bool {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if Self::elements(&inner) >= N {
                false
            } else {
                inner.put_ptr = inner.put_ptr.wrapping_add(1);
                true
            }
        })
    }

    /// Remove and return the oldest committed value, if any.
    pub fn pop(&self) -> Option<T> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if Self::elements(&inner) == 0 {
                return None;
            }
            let idx = inner.get_ptr % N;
            let v = inner.slots[idx].take();
            inner.get_ptr = inner.get_ptr.wrapping_add(1);
            v
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| Self::elements(&self.inner.borrow_ref(cs)))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }
}

impl<T, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::Ring;

    #[test]
    fn reserve_then_commit_then_pop_round_trips() {
        let ring: Ring<u32, 4> = Ring::new();
        let idx = ring.peek_put().unwrap();
        ring.write(idx, 42);
        assert!(ring.commit_put());
        assert_eq!(ring.pop(), Some(42));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn peek_put_without_commit_does_not_publish() {
        let ring: Ring<u32, 4> = Ring::new();
        let idx = ring.peek_put().unwrap();
        ring.write(idx, 7);
        // no commit_put(): the slot is written but not yet visible.
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_rejects_reservation() {
        let ring: Ring<u32, 2> = Ring::new();
        for v in 0..2u32 {
            let idx = ring.peek_put().unwrap();
            ring.write(idx, v);
            assert!(ring.commit_put());
        }
        assert_eq!(ring.peek_put(), None);
    }

    #[test]
    fn spsc_no_duplicate_and_no_loss_under_interleaving() {
        let ring: Ring<u32, 8> = Ring::new();
        let mut produced = std::vec::Vec::new();
        let mut consumed = std::vec::Vec::new();
        for v in 0..20u32 {
            if let Some(idx) = ring.peek_put() {
                ring.write(idx, v);
                ring.commit_put();
                produced.push(v);
            }
            if let Some(got) = ring.pop() {
                consumed.push(got);
            }
        }
        while let Some(got) = ring.pop() {
            consumed.push(got);
        }
        assert_eq!(produced, consumed);
    }
}
