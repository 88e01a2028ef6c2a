//! Reference collaborators (A4): one concrete, in-memory, `no_std`
//! implementation of the schedule/queues/frame-security/timesync
//! capability set, grounded in the collaborator crate's own
//! `mac_802154::config::Config` field set (`min_be`, `max_be`,
//! `csma_max_backoffs`) and its `tick_cap` CSMA backoff redraw
//! (`rand_core::RngCore`, `backoff = rng.next_u32() % (2^be - 1) + 1`).
//!
//! This is a test/reference fixture, not a production schedule, security,
//! or timesync stack -- those remain external collaborators by design.

use crate::asn::Asn;
use crate::collaborators::{EackInfo, NextLink, ParsedHeader, SlotCollaborators};
use crate::link::Link;
use crate::neighbor::{Neighbor, NeighborId, PacketId};
use crate::packet::{Packet, MAX_FRAME_LEN};
use heapless::Vec;
use rand_core::RngCore;

/// Minimal header layout used by the reference `FrameIo`: a fixed 8-byte
/// plaintext header (no security), not an 802.15.4 MHR encoding -- the
/// Non-goal boundary from §1 excludes a real framer.
///
/// `[flags:1][seq:1][dest_pan:2][dest:2][src:2]`
const HEADER_LEN: usize = 8;

const FLAG_ACK_REQUESTED: u8 = 0b001;
const FLAG_IS_BEACON: u8 = 0b010;
const FLAG_IS_BROADCAST: u8 = 0b100;

/// Enhanced-ACK wire layout: `[seq:1][drift_us:4 LE][nack:1]`.
const EACK_LEN: usize = 6;

pub fn encode_header(buf: &mut [u8], flags: u8, seq: u8, dest_pan: u16, dest: u16, src: u16) {
    buf[0] = flags;
    buf[1] = seq;
    buf[2..4].copy_from_slice(&dest_pan.to_le_bytes());
    buf[4..6].copy_from_slice(&dest.to_le_bytes());
    buf[6..8].copy_from_slice(&src.to_le_bytes());
}

/// Accumulates the single most recent drift observation, enough to assert
/// the drift-clamp and timesync-update testable properties without a full
/// adaptive filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReferenceTimesync {
    pub last_drift_ticks: i32,
    pub last_slots_since_sync: i64,
    pub keepalives_scheduled: u32,
}

struct NeighborSlot {
    neighbor: Neighbor<u16>,
    queue: Vec<PacketId, 8>,
}

/// A fixed-size slotframe entry plus its packet arena, keyed by `slot_offset`.
pub struct ReferenceCollaborators<RNG, const LINKS: usize, const NBRS: usize, const PKTS: usize> {
    pub pan_id: u16,
    pub schedule: Vec<Link<u16>, LINKS>,
    pub slotframe_len: u16,
    neighbors: Vec<NeighborSlot, NBRS>,
    packets: Vec<Option<Packet>, PKTS>,
    pub min_be: u8,
    pub max_be: u8,
    pub csma_max_backoffs: u8,
    pub rng: RNG,
    pub timesync: ReferenceTimesync,
    pub events_polled: u32,
}

impl<RNG: RngCore, const LINKS: usize, const NBRS: usize, const PKTS: usize> ReferenceCollaborators<RNG, LINKS, NBRS, PKTS> {
    pub fn new(pan_id: u16, slotframe_len: u16, rng: RNG) -> Self {
        Self {
            pan_id,
            schedule: Vec::new(),
            slotframe_len,
            neighbors: Vec::new(),
            packets: Vec::new(),
            min_be: 1,
            max_be: 7,
            csma_max_backoffs: 4,
            rng,
            timesync: ReferenceTimesync::default(),
            events_polled: 0,
        }
    }

    pub fn add_link(&mut self, link: Link<u16>) -> Result<(), ()> {
        self.schedule.push(link).map_err(|_| ())
    }

    pub fn add_neighbor(&mut self, address: u16) -> NeighborId {
        let id = self.neighbors.len();
        let mut n = Neighbor::new(address, self.min_be);
        if address == 0xFFFF {
            n = Neighbor::broadcast(address);
        }
        let _ = self.neighbors.push(NeighborSlot { neighbor: n, queue: Vec::new() });
        NeighborId(id)
    }

    /// Queues a packet for `nbr`, returning its arena handle.
    pub fn enqueue(&mut self, nbr: NeighborId, packet: Packet) -> Result<PacketId, ()> {
        let idx = self.packets.iter().position(Option::is_none).unwrap_or(self.packets.len());
        if idx == self.packets.len() {
            self.packets.push(Some(packet)).map_err(|_| ())?;
        } else {
            self.packets[idx] = Some(packet);
        }
        let pkt = PacketId(idx);
        self.neighbors[nbr.0].queue.push(pkt).map_err(|_| ())?;
        Ok(pkt)
    }

    fn redraw_backoff(&mut self, be: u8) -> u8 {
        let span = 2u32.pow(be as u32).saturating_sub(1).max(1);
        ((self.rng.next_u32() % span) + 1) as u8
    }
}

impl<RNG: RngCore, const LINKS: usize, const NBRS: usize, const PKTS: usize> SlotCollaborators
    for ReferenceCollaborators<RNG, LINKS, NBRS, PKTS>
{
    type Addr = u16;

    fn next_active_link(&mut self, asn: Asn) -> NextLink<u16> {
        if self.schedule.is_empty() || self.slotframe_len == 0 {
            return NextLink { link: None, slots_until: 1, backup_link: None };
        }
        let cur = asn.modulo(self.slotframe_len);
        let mut best: Option<(u16, Link<u16>)> = None;
        for link in self.schedule.iter() {
            let delta = if link.slot_offset >= cur {
                link.slot_offset - cur
            } else {
                self.slotframe_len - cur + link.slot_offset
            };
            let delta = delta.max(1);
            if best.map(|(d, _)| delta < d).unwrap_or(true) {
                best = Some((delta, *link));
            }
        }
        match best {
            Some((delta, link)) => NextLink { link: Some(link), slots_until: delta as u64, backup_link: None },
            None => NextLink { link: None, slots_until: 1, backup_link: None },
        }
    }

    fn eb_neighbor(&self) -> NeighborId {
        NeighborId(0)
    }

    fn broadcast_neighbor(&self) -> NeighborId {
        self.neighbors
            .iter()
            .position(|n| n.neighbor.is_broadcast)
            .map(NeighborId)
            .unwrap_or(NeighborId(0))
    }

    fn neighbor_for_address(&mut self, addr: &u16) -> Option<NeighborId> {
        self.neighbors.iter().position(|n| n.neighbor.address == *addr).map(NeighborId)
    }

    fn packet_for_neighbor(&mut self, nbr: NeighborId, _link: &Link<u16>) -> Option<PacketId> {
        self.neighbors[nbr.0].queue.first().copied()
    }

    fn unicast_packet_for_any(&mut self, _link: &Link<u16>) -> Option<(NeighborId, PacketId)> {
        for (idx, slot) in self.neighbors.iter().enumerate() {
            if !slot.neighbor.is_broadcast {
                if let Some(&pkt) = slot.queue.first() {
                    return Some((NeighborId(idx), pkt));
                }
            }
        }
        None
    }

    fn remove_packet_from_queue(&mut self, nbr: NeighborId, pkt: PacketId) {
        let queue = &mut self.neighbors[nbr.0].queue;
        if let Some(pos) = queue.iter().position(|&p| p == pkt) {
            queue.swap_remove(pos);
        }
        self.packets[pkt.0] = None;
    }

    fn queue_is_empty(&self, nbr: NeighborId) -> bool {
        self.neighbors[nbr.0].queue.is_empty()
    }

    fn backoff_reset(&mut self, nbr: NeighborId) {
        let n = &mut self.neighbors[nbr.0].neighbor;
        n.backoff_exponent = self.min_be;
        n.backoff_window = 0;
    }

    fn backoff_inc(&mut self, nbr: NeighborId) {
        let max_be = self.max_be;
        let be = {
            let n = &mut self.neighbors[nbr.0].neighbor;
            n.backoff_exponent = (n.backoff_exponent + 1).min(max_be);
            n.backoff_exponent
        };
        let window = self.redraw_backoff(be);
        self.neighbors[nbr.0].neighbor.backoff_window = window;
    }

    fn update_all_backoff_windows(&mut self, link_addr: &u16) {
        for slot in self.neighbors.iter_mut() {
            if slot.neighbor.address == *link_addr || slot.neighbor.is_broadcast {
                slot.neighbor.backoff_window = slot.neighbor.backoff_window.saturating_sub(1);
            }
        }
    }

    fn neighbor(&self, nbr: NeighborId) -> &Neighbor<u16> {
        &self.neighbors[nbr.0].neighbor
    }

    fn packet(&self, pkt: PacketId) -> &Packet {
        self.packets[pkt.0].as_ref().expect("packet handle outlived its slot")
    }

    fn packet_mut(&mut self, pkt: PacketId) -> &mut Packet {
        self.packets[pkt.0].as_mut().expect("packet handle outlived its slot")
    }

    fn prepare_tx_frame(&mut self, pkt: PacketId, asn: Asn, scratch: &mut [u8; MAX_FRAME_LEN]) -> Result<usize, ()> {
        let packet = self.packets[pkt.0].as_ref().ok_or(())?;
        let len = packet.frame.len();
        scratch[..len].copy_from_slice(&packet.frame);
        if let Some(offset) = packet.sync_ie_offset {
            if offset + 8 <= len {
                scratch[offset..offset + 8].copy_from_slice(&asn.0.to_le_bytes());
            }
        }
        Ok(len)
    }

    fn parse_header(&self, buf: &[u8]) -> Option<ParsedHeader<u16>> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let flags = buf[0];
        let seq = buf[1];
        let dest_pan = u16::from_le_bytes([buf[2], buf[3]]);
        let destination = u16::from_le_bytes([buf[4], buf[5]]);
        let source = u16::from_le_bytes([buf[6], buf[7]]);
        Some(ParsedHeader {
            header_len: HEADER_LEN,
            destination,
            source,
            dest_pan_ok: dest_pan == self.pan_id || dest_pan == 0xFFFF,
            ack_requested: flags & FLAG_ACK_REQUESTED != 0,
            seq,
            is_beacon: flags & FLAG_IS_BEACON != 0,
            is_broadcast: flags & FLAG_IS_BROADCAST != 0,
        })
    }

    fn validate_rx_frame(&mut self, _buf: &mut Vec<u8, MAX_FRAME_LEN>, _header: &ParsedHeader<u16>, _asn: Asn) -> bool {
        // Null security: every well-formed header is accepted (§4.12 --
        // matches the original's LLSEC802154_ENABLED=0 configuration).
        true
    }

    fn build_eack(&mut self, buf: &mut [u8; MAX_FRAME_LEN], _dest: &u16, seq: u8, drift_us: i32, nack: bool, _asn: Asn) -> Option<usize> {
        buf[0] = seq;
        buf[1..5].copy_from_slice(&drift_us.to_le_bytes());
        buf[5] = nack as u8;
        Some(EACK_LEN)
    }

    fn parse_and_authenticate_eack(&mut self, buf: &[u8], expected_seq: u8, _source: &u16, _asn: Asn) -> Option<EackInfo> {
        if buf.len() < EACK_LEN || buf[0] != expected_seq || buf[5] != 0 {
            return None;
        }
        let time_correction_us = i32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
        Some(EackInfo { time_correction_us })
    }

    fn should_nack(&mut self, _link: &Link<u16>, _source: &u16, _destination: &u16) -> bool {
        false
    }

    fn timesync_update(&mut self, _nbr: NeighborId, slots_since_last_sync: i64, drift_ticks: i32) {
        self.timesync.last_drift_ticks = drift_ticks;
        self.timesync.last_slots_since_sync = slots_since_last_sync;
    }

    fn adaptive_compensate(&mut self, _wake_offset_ticks: i64) -> i64 {
        0
    }

    fn schedule_keepalive(&mut self) {
        self.timesync.keepalives_scheduled += 1;
    }

    fn poll_pending_events(&mut self) {
        self.events_polled += 1;
    }
}
