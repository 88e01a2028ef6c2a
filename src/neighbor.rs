//! Neighbor table entries (§3) and the opaque handles the `Queues`
//! collaborator hands back to the slot core.
//!
//! Handles rather than borrowed references: the slot executor needs to
//! hold a "current packet"/"current neighbor" reference across the whole
//! TX/RX sub-procedure while also calling back into the same collaborator
//! mutably (to update backoff state, remove the packet, ...). An opaque
//! index avoids fighting the borrow checker over that, the same way an
//! arena/slot-map would.

/// Opaque handle to a neighbor-table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NeighborId(pub usize);

/// Opaque handle to a queued packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighbor<A> {
    pub address: A,
    pub is_broadcast: bool,
    pub is_time_source: bool,
    pub backoff_window: u8,
    pub backoff_exponent: u8,
}

impl<A> Neighbor<A> {
    pub fn new(address: A, min_be: u8) -> Self {
        Self {
            address,
            is_broadcast: false,
            is_time_source: false,
            backoff_window: 0,
            backoff_exponent: min_be,
        }
    }

    pub fn broadcast(address: A) -> Self {
        let mut n = Self::new(address, 0);
        n.is_broadcast = true;
        n
    }
}
