//! TX sub-procedure (C6, §4.6): one-shot transmit with optional CCA,
//! optional ACK reception, drift extraction, and retry/backoff update.

use crate::asn::Asn;
use crate::collaborators::SlotCollaborators;
use crate::config::{clamp_drift, sync_bound, SlotPolicy, TimingTable};
use crate::error::TxOutcome;
use crate::link::Link;
use crate::neighbor::{NeighborId, PacketId};
use crate::radio::{radio_off, radio_on, Radio, RadioGatePolicy, RadioOffCmd, RadioOnCmd, TxStatus};
use crate::ring::Ring;
use crate::stats::SlotStats;
use crate::timer::{schedule_and_yield, HwTimer, Ticks};

/// Microseconds to ticks, assuming the default 1 MHz simulated timer where
/// one tick equals one microsecond (see §6's timing-table compatibility
/// note); platforms with a slower timer scale this conversion accordingly.
fn us_to_ticks(us: i32) -> i32 {
    us
}

pub struct TxResult {
    pub outcome: TxOutcome,
    pub drift_applied: Option<i32>,
    pub packet_removed: bool,
}

/// Runs the full TX sub-procedure for `pkt` bound to `nbr` over `link`.
/// Returns `None` if the dequeued ring had no free slot (§4.6 step 1): the
/// slot aborts with no state change at all.
#[allow(clippy::too_many_arguments)]
pub fn run_tx_slot<R, T, C, const DQ: usize>(
    radio: &mut R,
    timer: &mut T,
    collaborators: &mut C,
    dequeued_ring: &Ring<PacketId, DQ>,
    timing: &TimingTable,
    policy: &SlotPolicy,
    gate: RadioGatePolicy,
    link: &Link<C::Addr>,
    pkt: PacketId,
    nbr: NeighborId,
    slot_start: Ticks,
    current_asn: Asn,
    last_sync_asn: Asn,
    stats: &mut SlotStats,
) -> Option<TxResult>
where
    R: Radio,
    T: HwTimer,
    C: SlotCollaborators,
{
    // Step 1: reserve a dequeued-ring slot.
    if dequeued_ring.peek_put().is_none() {
        stats.tx_ring_full += 1;
        return None;
    }

    // Step 2 (malformed check) is folded into step 3/4 below: an empty
    // frame can never be validly prepared.
    if collaborators.packet(pkt).is_empty() {
        let outcome = TxOutcome::ErrFatal;
        stats.record_tx(outcome);
        return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
    }

    // Steps 3-4: Sync-IE update + security, then hand to the radio.
    let mut scratch = [0u8; crate::packet::MAX_FRAME_LEN];
    let len = match collaborators.prepare_tx_frame(pkt, current_asn, &mut scratch) {
        Ok(len) => len,
        Err(()) => {
            let outcome = TxOutcome::ErrFatal;
            stats.record_tx(outcome);
            return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
        }
    };
    if radio.prepare(&scratch, len).is_err() {
        let outcome = TxOutcome::Err;
        stats.record_tx(outcome);
        return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
    }

    // Step 5: optional CCA.
    if policy.cca_enabled {
        schedule_and_yield(timer, slot_start, timing.cca_offset);
        let _ = radio_on(radio, gate, RadioOnCmd::WithinTimeslot);
        let clear = radio.channel_clear().unwrap_or(false);
        schedule_and_yield(timer, slot_start, timing.cca_offset + timing.cca_duration);
        if !clear {
            let outcome = TxOutcome::Collision;
            stats.record_tx(outcome);
            return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
        }
    }

    // Step 6: transmit at the exact tx_offset instant.
    schedule_and_yield(timer, slot_start, timing.tx_offset.wrapping_sub(policy.radio_delay_before_tx));
    let tx_status = radio.transmit();

    // Step 7: radio off (policy-dependent) after the TX window.
    let _ = radio_off(radio, gate, RadioOffCmd::WithinTimeslot);

    let tx_status = match tx_status {
        Ok(status) => status,
        Err(_) => {
            let outcome = TxOutcome::Err;
            stats.record_tx(outcome);
            return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
        }
    };
    if tx_status == TxStatus::Err {
        let outcome = TxOutcome::Err;
        stats.record_tx(outcome);
        return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
    }

    let is_unicast = !collaborators.neighbor(nbr).is_broadcast;
    if !is_unicast {
        let outcome = TxOutcome::Ok;
        stats.record_tx(outcome);
        return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
    }

    // Step 8: wait for the enhanced ACK.
    schedule_and_yield(
        timer,
        slot_start,
        timing
            .tx_offset
            .wrapping_add(timing.rx_ack_delay)
            .wrapping_sub(policy.radio_delay_before_rx),
    );
    let _ = radio_on(radio, gate, RadioOnCmd::WithinTimeslot);
    let ack_seen = radio.receiving_packet();
    schedule_and_yield(
        timer,
        slot_start,
        timing
            .tx_offset
            .wrapping_add(timing.rx_ack_delay)
            .wrapping_add(timing.ack_wait),
    );
    let _ = radio_off(radio, gate, RadioOffCmd::WithinTimeslot);

    if !ack_seen {
        let outcome = TxOutcome::NoAck;
        stats.record_tx(outcome);
        return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
    }

    let mut ack_buf = [0u8; crate::packet::MAX_FRAME_LEN];
    let n = radio.read(&mut ack_buf);
    let seq = collaborators.packet(pkt).seq;
    let neighbor_addr = collaborators.neighbor(nbr).address;
    let eack = collaborators.parse_and_authenticate_eack(&ack_buf[..n], seq, &neighbor_addr, current_asn);

    let eack = match eack {
        Some(e) => e,
        None => {
            let outcome = TxOutcome::Err;
            stats.record_tx(outcome);
            return Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, None, stats));
        }
    };

    // Step 9: drift extraction.
    let bound = sync_bound(timing);
    let raw = us_to_ticks(eack.time_correction_us);
    let applied = clamp_drift(raw, bound);
    if applied != raw {
        stats.drift_clamped += 1;
    }
    let slots_since_last_sync = Asn::diff(current_asn, last_sync_asn);
    collaborators.timesync_update(nbr, slots_since_last_sync, applied);
    collaborators.schedule_keepalive();

    let outcome = TxOutcome::Ok;
    stats.record_tx(outcome);
    Some(finish(collaborators, dequeued_ring, policy, link, nbr, pkt, outcome, Some(applied), stats))
}

/// Steps 10-12: classify, update neighbor/backoff state, publish to the
/// dequeued ring if the packet was removed, poll pending events.
#[allow(clippy::too_many_arguments)]
fn finish<C: SlotCollaborators, const DQ: usize>(
    collaborators: &mut C,
    dequeued_ring: &Ring<PacketId, DQ>,
    policy: &SlotPolicy,
    link: &Link<C::Addr>,
    nbr: NeighborId,
    pkt: PacketId,
    outcome: TxOutcome,
    _drift_applied: Option<i32>,
    stats: &mut SlotStats,
) -> TxResult {
    {
        let p = collaborators.packet_mut(pkt);
        p.transmissions += 1;
        p.last_result = Some(outcome);
    }

    let transmissions = collaborators.packet(pkt).transmissions;
    let is_unicast = !collaborators.neighbor(nbr).is_broadcast;

    let removed = match outcome {
        TxOutcome::Ok => true,
        _ => transmissions >= policy.max_frame_retries + 1,
    };

    if is_unicast {
        match outcome {
            TxOutcome::Ok => {
                if link.is_shared() || collaborators.queue_is_empty(nbr) {
                    collaborators.backoff_reset(nbr);
                }
            }
            _ => {
                if link.is_shared() {
                    collaborators.backoff_inc(nbr);
                }
            }
        }
    }

    if removed {
        collaborators.remove_packet_from_queue(nbr, pkt);
        if let Some(idx) = dequeued_ring.peek_put() {
            dequeued_ring.write(idx, pkt);
            dequeued_ring.commit_put();
        }
    }

    collaborators.poll_pending_events();

    TxResult { outcome, drift_applied: _drift_applied, packet_removed: removed }
}
