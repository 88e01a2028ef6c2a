//! Cross-context lock between the interrupt-context slot executor and
//! foreground callers that need to mutate the schedule, queues, or
//! neighbor table.
//!
//! This is not a mutex that puts its acquirer to sleep: the executor never
//! blocks, so the handshake is a one-bit flag pair (`lock_requested`,
//! `in_slot_operation`) bounded to resolve within one slot length. Shared
//! state lives behind `critical_section::Mutex` rather than raw atomics,
//! since not every embedded target guarantees lock-free CAS.

use core::cell::Cell;
use critical_section::Mutex;

pub struct SlotLock {
    locked: Mutex<Cell<bool>>,
    lock_requested: Mutex<Cell<bool>>,
    in_slot_operation: Mutex<Cell<bool>>,
}

impl SlotLock {
    pub const fn new() -> Self {
        Self {
            locked: Mutex::new(Cell::new(false)),
            lock_requested: Mutex::new(Cell::new(false)),
            in_slot_operation: Mutex::new(Cell::new(false)),
        }
    }

    pub fn is_locked(&self) -> bool {
        critical_section::with(|cs| self.locked.borrow(cs).get())
    }

    pub fn lock_requested(&self) -> bool {
        critical_section::with(|cs| self.lock_requested.borrow(cs).get())
    }

    pub(crate) fn is_in_slot_operation(&self) -> bool {
        critical_section::with(|cs| self.in_slot_operation.borrow(cs).get())
    }

    /// Entered by the executor at the top of a dispatched slot. Invariant
    /// I1: while this is true, `locked` must never become true.
    pub(crate) fn enter_slot(&self) {
        critical_section::with(|cs| self.in_slot_operation.borrow(cs).set(true));
    }

    pub(crate) fn exit_slot(&self) {
        critical_section::with(|cs| self.in_slot_operation.borrow(cs).set(false));
    }

    /// Foreground-only. Raises `lock_requested`, spins (via `on_wait`,
    /// called cooperatively) while the executor is mid-slot, then attempts
    /// to take the lock. Fails if another foreground acquirer got there
    /// first; on failure `lock_requested` is left set, exactly as the
    /// original leaves it -- a second acquire attempt simply re-raises the
    /// same flag, which is harmless under the single-foreground-caller
    /// assumption this collaborator contract relies on.
    pub fn acquire(&self, mut on_wait: impl FnMut()) -> bool {
        critical_section::with(|cs| self.lock_requested.borrow(cs).set(true));
        while self.is_in_slot_operation() {
            on_wait();
        }
        critical_section::with(|cs| {
            if self.locked.borrow(cs).get() {
                false
            } else {
                self.locked.borrow(cs).set(true);
                self.lock_requested.borrow(cs).set(false);
                true
            }
        })
    }

    pub fn release(&self) {
        critical_section::with(|cs| self.locked.borrow(cs).set(false));
    }
}

impl Default for SlotLock {
    fn default() -> Self {
        Self::new()
    }
}
