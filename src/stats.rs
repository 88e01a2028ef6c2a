//! Per-process counters, mirroring the collaborator crate's own
//! `MacStats` pattern (`mac_802154::mod::MacStats`).

use crate::error::{RxOutcome, TxOutcome};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub slots_skipped_lock: u32,
    pub slots_skipped_no_link: u32,
    pub deadline_misses: u32,
    pub tx_ok: u32,
    pub tx_noack: u32,
    pub tx_err: u32,
    pub tx_err_fatal: u32,
    pub tx_collision: u32,
    pub tx_ring_full: u32,
    pub rx_idle: u32,
    pub rx_received: u32,
    pub rx_dropped: u32,
    pub rx_ring_full: u32,
    pub drift_clamped: u32,
    pub desyncs: u32,
}

impl SlotStats {
    pub fn record_tx(&mut self, outcome: TxOutcome) {
        match outcome {
            TxOutcome::Ok => self.tx_ok += 1,
            TxOutcome::NoAck => self.tx_noack += 1,
            TxOutcome::Err => self.tx_err += 1,
            TxOutcome::ErrFatal => self.tx_err_fatal += 1,
            TxOutcome::Collision => self.tx_collision += 1,
        }
    }

    pub fn record_rx(&mut self, outcome: RxOutcome) {
        match outcome {
            RxOutcome::Idle => self.rx_idle += 1,
            RxOutcome::Received => self.rx_received += 1,
            RxOutcome::Dropped => self.rx_dropped += 1,
        }
    }
}
