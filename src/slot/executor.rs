//! Slot executor (C8, §4.8): the cooperative, interrupt-re-entered
//! procedure that binds a link, dispatches TX/RX, and schedules the next
//! wake-up.

use crate::asn::Asn;
use crate::channel::HoppingSequence;
use crate::collaborators::SlotCollaborators;
use crate::config::{SlotPolicy, TimingTable};
use crate::link::Link;
use crate::lock::SlotLock;
use crate::packet::InputPacket;
use crate::radio::{radio_on, Radio, RadioGatePolicy, RadioOnCmd};
use crate::ring::Ring;
use crate::slot::bind;
use crate::slot::rx::run_rx_slot;
use crate::slot::tx::run_tx_slot;
use crate::stats::SlotStats;
use crate::timer::{schedule_slot_operation, HwTimer, Ticks};

/// Persistent, process-wide slot-operation state (§6), owned across the
/// whole TSCH association lifetime.
pub struct SlotMachine<A, const N: usize, const DQ: usize, const RQ: usize> {
    pub current_slot_start: Ticks,
    pub current_asn: Asn,
    pub last_sync_asn: Asn,
    pub current_link: Option<Link<A>>,
    pub backup_link: Option<Link<A>>,
    pub associated: bool,
    pub drift_correction: i32,
    pub is_drift_correction_used: bool,
    pub lock: SlotLock,
    pub hopping: HoppingSequence<N>,
    pub dequeued_ring: Ring<crate::neighbor::PacketId, DQ>,
    pub input_ring: Ring<InputPacket, RQ>,
    pub this_addr: A,
    pub broadcast_addr: A,
    pub stats: SlotStats,
}

impl<A: Copy + Eq + core::fmt::Debug, const N: usize, const DQ: usize, const RQ: usize> SlotMachine<A, N, DQ, RQ> {
    pub fn new(hopping: HoppingSequence<N>, this_addr: A, broadcast_addr: A) -> Self {
        Self {
            current_slot_start: 0,
            current_asn: Asn::ZERO,
            last_sync_asn: Asn::ZERO,
            current_link: None,
            backup_link: None,
            associated: false,
            drift_correction: 0,
            is_drift_correction_used: false,
            lock: SlotLock::new(),
            hopping,
            dequeued_ring: Ring::new(),
            input_ring: Ring::new(),
            this_addr,
            broadcast_addr,
            stats: SlotStats::default(),
        }
    }

    /// `slot_operation_start()` (§6): arms the first wake-up at the current
    /// timer reading, one timeslot out.
    pub fn slot_operation_start<T: HwTimer>(&mut self, timer: &mut T, timing: &TimingTable) {
        self.current_slot_start = timer.now();
        schedule_slot_operation(timer, self.current_slot_start, timing.timeslot_length);
    }

    /// `slot_operation_sync()` (§6): called once association/scan achieves
    /// synchronization.
    pub fn slot_operation_sync(&mut self, next_slot_start: Ticks, next_slot_asn: Asn) {
        self.current_slot_start = next_slot_start;
        self.current_asn = next_slot_asn;
        self.last_sync_asn = next_slot_asn;
        self.current_link = None;
        self.associated = true;
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn calculate_channel(&self, asn: Asn, channel_offset: u8) -> u8 {
        self.hopping.channel(asn, channel_offset)
    }
}

/// Runs one iteration of the slot executor (§4.8). Returns `false` when the
/// state machine has disassociated and must not be re-armed.
#[allow(clippy::too_many_arguments)]
pub fn run_iteration<R, T, C, A, const N: usize, const DQ: usize, const RQ: usize>(
    machine: &mut SlotMachine<A, N, DQ, RQ>,
    radio: &mut R,
    timer: &mut T,
    collaborators: &mut C,
    timing: &TimingTable,
    policy: &SlotPolicy,
    gate: RadioGatePolicy,
) -> bool
where
    R: Radio,
    T: HwTimer,
    C: SlotCollaborators<Addr = A>,
    A: Copy + Eq + core::fmt::Debug,
{
    // Step 1.
    if !machine.associated {
        return false;
    }

    let mut just_tx_shared_link = None;

    // Step 2.
    if machine.current_link.is_none() || machine.lock.lock_requested() {
        machine.stats.slots_skipped_lock += 1;
    } else {
        // Step 3.
        machine.lock.enter_slot();
        let mut active_link = machine.current_link.unwrap();
        let mut selection = bind::select(collaborators, &active_link);

        // A pure-TX link with nothing to send falls back to the overlapping
        // backup link (§4.5) instead of sitting the slot out.
        if active_link.is_tx() && !active_link.is_rx() && selection.packet.is_none() {
            if let Some(backup) = machine.backup_link {
                active_link = backup;
                selection = bind::select(collaborators, &active_link);
            }
        }

        // Step 4: an active slot either has a bound packet or is an RX link.
        let is_active = selection.packet.is_some() || active_link.is_rx();
        if is_active {
            let channel = machine.calculate_channel(machine.current_asn, active_link.channel_offset);
            let _ = radio.set_channel(channel);
            let _ = radio_on(radio, gate, RadioOnCmd::StartOfTimeslot);

            if let (Some(pkt), Some(nbr)) = (selection.packet, selection.neighbor) {
                if let Some(result) = run_tx_slot(
                    radio,
                    timer,
                    collaborators,
                    &machine.dequeued_ring,
                    timing,
                    policy,
                    gate,
                    &active_link,
                    pkt,
                    nbr,
                    machine.current_slot_start,
                    machine.current_asn,
                    machine.last_sync_asn,
                    &mut machine.stats,
                ) {
                    if let Some(applied) = result.drift_applied {
                        machine.last_sync_asn = machine.current_asn;
                        machine.drift_correction = applied;
                        machine.is_drift_correction_used = true;
                    }
                }
                if active_link.is_shared() {
                    just_tx_shared_link = Some(active_link.peer_address);
                }
            } else {
                let result = run_rx_slot(
                    radio,
                    timer,
                    collaborators,
                    &machine.input_ring,
                    timing,
                    policy,
                    gate,
                    &active_link,
                    machine.current_slot_start,
                    machine.current_asn,
                    machine.last_sync_asn,
                    &machine.this_addr,
                    &machine.broadcast_addr,
                    channel,
                    &mut machine.stats,
                );
                if let Some(correction) = result.sync_applied {
                    machine.last_sync_asn = machine.current_asn;
                    machine.drift_correction = correction;
                    machine.is_drift_correction_used = true;
                }
            }
        } else {
            machine.stats.slots_skipped_no_link += 1;
        }

        machine.lock.exit_slot();
    }

    // Step 5: resynchronization check.
    let slots_since_sync = Asn::diff(machine.current_asn, machine.last_sync_asn);
    if slots_since_sync.unsigned_abs() as i64 > policy.desync_threshold_slots {
        machine.associated = false;
        machine.stats.desyncs += 1;
        return false;
    }

    schedule_next(machine, timer, collaborators, timing, policy, just_tx_shared_link)
}

fn schedule_next<T, C, A, const N: usize, const DQ: usize, const RQ: usize>(
    machine: &mut SlotMachine<A, N, DQ, RQ>,
    timer: &mut T,
    collaborators: &mut C,
    timing: &TimingTable,
    _policy: &SlotPolicy,
    just_tx_shared_link: Option<A>,
) -> bool
where
    T: HwTimer,
    C: SlotCollaborators<Addr = A>,
    A: Copy + Eq + core::fmt::Debug,
{
    // Step 6a.
    if let Some(addr) = just_tx_shared_link {
        collaborators.update_all_backoff_windows(&addr);
    }

    loop {
        // Step 6b.
        let next = collaborators.next_active_link(machine.current_asn);
        let slots_until = next.slots_until.max(1);

        // Step 6c.
        machine.current_asn = machine.current_asn.advance(slots_until);
        let drift_correction = if machine.is_drift_correction_used {
            machine.is_drift_correction_used = false;
            let applied = machine.drift_correction;
            machine.drift_correction = 0;
            applied as i64
        } else {
            0
        };
        let wake_offset =
            (slots_until as i64).saturating_mul(timing.timeslot_length as i64).saturating_add(drift_correction);

        // Step 6d.
        let compensation = collaborators.adaptive_compensate(wake_offset);
        let prev = machine.current_slot_start;
        let total_offset = (wake_offset + compensation) as i32;
        machine.current_slot_start = crate::timer::ticks_add_signed(prev, total_offset);
        machine.current_link = next.link;
        machine.backup_link = next.backup_link;

        // Step 6e.
        if schedule_slot_operation(timer, prev, total_offset as Ticks) {
            break;
        }
        machine.stats.deadline_misses += 1;
    }

    true
}
