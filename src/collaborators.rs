//! Trait boundary to the external collaborators the slot core consumes
//! (§6): the link/cell schedule, per-neighbor queues, frame parsing and
//! security, adaptive timesync, and the pending-event sink.
//!
//! Bundled behind one aggregate trait rather than five separate generic
//! parameters on `SlotMachine` -- a single "platform" trait is the common
//! shape for this kind of embedded board-support boundary, and it keeps
//! the slot machine's own type signature readable.

use crate::asn::Asn;
use crate::link::Link;
use crate::neighbor::{Neighbor, NeighborId, PacketId};
use crate::packet::{Packet, MAX_FRAME_LEN};
use heapless::Vec;

/// Result of asking the schedule for the next slot to act on (§4.8 step 6b).
pub struct NextLink<A> {
    pub link: Option<Link<A>>,
    pub slots_until: u64,
    pub backup_link: Option<Link<A>>,
}

/// Header fields the slot core needs out of a parsed inbound frame (§4.7
/// step 8).
pub struct ParsedHeader<A> {
    pub header_len: usize,
    pub destination: A,
    pub source: A,
    pub dest_pan_ok: bool,
    pub ack_requested: bool,
    pub seq: u8,
    pub is_beacon: bool,
    pub is_broadcast: bool,
}

/// Result of parsing and authenticating an inbound enhanced ACK (§4.6 step 8).
pub struct EackInfo {
    pub time_correction_us: i32,
}

pub trait SlotCollaborators {
    type Addr: Copy + Eq + core::fmt::Debug;

    // --- Schedule ---

    fn next_active_link(&mut self, asn: Asn) -> NextLink<Self::Addr>;

    // --- Queues / link binding (§4.5) ---

    fn eb_neighbor(&self) -> NeighborId;
    fn broadcast_neighbor(&self) -> NeighborId;
    fn neighbor_for_address(&mut self, addr: &Self::Addr) -> Option<NeighborId>;
    fn packet_for_neighbor(&mut self, nbr: NeighborId, link: &Link<Self::Addr>) -> Option<PacketId>;
    fn unicast_packet_for_any(&mut self, link: &Link<Self::Addr>) -> Option<(NeighborId, PacketId)>;
    fn remove_packet_from_queue(&mut self, nbr: NeighborId, pkt: PacketId);
    fn queue_is_empty(&self, nbr: NeighborId) -> bool;
    fn backoff_reset(&mut self, nbr: NeighborId);
    fn backoff_inc(&mut self, nbr: NeighborId);
    fn update_all_backoff_windows(&mut self, link_addr: &Self::Addr);
    fn neighbor(&self, nbr: NeighborId) -> &Neighbor<Self::Addr>;
    fn packet(&self, pkt: PacketId) -> &Packet;
    fn packet_mut(&mut self, pkt: PacketId) -> &mut Packet;

    // --- Frame / security (§4.6 steps 3-4, 9; §4.7 steps 8, 10) ---

    /// Updates the Sync-IE (if present) and runs per-frame security over
    /// `queues.packet(pkt)`, writing the frame to transmit into `scratch`
    /// and returning its length. The original frame is left untouched so a
    /// retransmission starts from the plaintext again.
    fn prepare_tx_frame(&mut self, pkt: PacketId, asn: Asn, scratch: &mut [u8; MAX_FRAME_LEN]) -> Result<usize, ()>;

    fn parse_header(&self, buf: &[u8]) -> Option<ParsedHeader<Self::Addr>>;

    /// Authenticates/decrypts `buf` in place (truncating off any MIC),
    /// returning whether the frame is acceptable.
    fn validate_rx_frame(&mut self, buf: &mut Vec<u8, MAX_FRAME_LEN>, header: &ParsedHeader<Self::Addr>, asn: Asn) -> bool;

    /// Builds and secures an enhanced ACK carrying `drift_us`, writing it
    /// into `buf` and returning its length.
    fn build_eack(
        &mut self,
        buf: &mut [u8; MAX_FRAME_LEN],
        dest: &Self::Addr,
        seq: u8,
        drift_us: i32,
        nack: bool,
        asn: Asn,
    ) -> Option<usize>;

    fn parse_and_authenticate_eack(&mut self, buf: &[u8], expected_seq: u8, source: &Self::Addr, asn: Asn) -> Option<EackInfo>;

    /// Whether the ACK about to be sent for a frame from `source` to
    /// `destination` over `link` should be a NACK (external backpressure
    /// callback, §4.7 step 10).
    fn should_nack(&mut self, link: &Link<Self::Addr>, source: &Self::Addr, destination: &Self::Addr) -> bool;

    // --- Timesync (§4.6 step 9, §4.7 step 11) ---

    fn timesync_update(&mut self, nbr: NeighborId, slots_since_last_sync: i64, drift_ticks: i32);
    fn adaptive_compensate(&mut self, wake_offset_ticks: i64) -> i64;
    fn schedule_keepalive(&mut self);

    // --- Event sink ---

    fn poll_pending_events(&mut self);
}
