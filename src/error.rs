//! Crate-wide error and per-slot outcome types (A1).
//!
//! `SlotError<RE>` is reserved for failures of the public entry points
//! themselves (see `slot::SlotMachine`); per-slot TX/RX anomalies (NOACK,
//! collision, deadline miss, dropped frame) are recoverable in place and
//! recorded in `SlotStats`, not propagated as `Result` errors.

/// Errors surfaced by the crate's public entry points. Generic over the
/// radio HAL's own error type, following the collaborator crate's
/// `CoreError<E>` / `BasicMacError<E>` wrapping idiom.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotError<RE> {
    /// Underlying radio driver error.
    Radio(RE),

    /// A ring buffer had no free slot for a reservation.
    RingFull,

    /// An inbound or outbound frame failed to parse.
    MalformedFrame,

    /// The slot machine has not yet synchronized via `slot_operation_sync`.
    NotAssociated,

    /// The lock is held by another foreground caller.
    Locked,
}

impl<RE> From<RE> for SlotError<RE> {
    fn from(e: RE) -> Self {
        SlotError::Radio(e)
    }
}

/// Outcome of one TX sub-procedure invocation (§4.6 step 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Ok,
    NoAck,
    Err,
    ErrFatal,
    Collision,
}

/// Outcome of one RX sub-procedure invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    Idle,
    Received,
    Dropped,
}
