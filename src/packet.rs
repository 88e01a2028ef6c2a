//! Packet and input-packet data model (§3), carried in fixed-capacity
//! owned storage the same way the collaborator crate's `mac_802154::packet`
//! carries its frame bytes in a `heapless::Vec`.

use crate::asn::Asn;
use crate::error::TxOutcome;
use heapless::Vec;

/// Maximum over-the-air frame length (802.15.4 PHY PPDU payload limit).
pub const MAX_FRAME_LEN: usize = 127;

/// A queued outbound frame, owned by a `Queues` collaborator and bound to
/// a link for the duration of one slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    /// The frame as it will be (or was) handed to the radio.
    pub frame: Vec<u8, MAX_FRAME_LEN>,

    /// Length of the frame header, needed by the security/frame collaborator
    /// to locate the authenticated/encrypted portion.
    pub header_len: usize,

    /// Byte offset of the Sync-IE field within `frame`, if this packet is an
    /// enhanced beacon; `update_eb` rewrites the ASN there before each TX.
    pub sync_ie_offset: Option<usize>,

    /// Number of transmission attempts made so far (§4.6 step 10).
    pub transmissions: u8,

    /// Result of the most recent transmission attempt, if any.
    pub last_result: Option<TxOutcome>,

    /// True for beacon frames (drives the Sync-IE update in step 3).
    pub is_eb: bool,

    /// MAC sequence number, used to match an inbound enhanced ACK to this
    /// packet.
    pub seq: u8,
}

impl Packet {
    pub fn new(frame: &[u8], header_len: usize) -> Result<Self, ()> {
        Self::with_seq(frame, header_len, 0)
    }

    pub fn with_seq(frame: &[u8], header_len: usize, seq: u8) -> Result<Self, ()> {
        let frame = Vec::from_slice(frame).map_err(|_| ())?;
        Ok(Self {
            frame,
            header_len,
            sync_ie_offset: None,
            transmissions: 0,
            seq,
            last_result: None,
            is_eb: false,
        })
    }

    pub fn beacon(frame: &[u8], header_len: usize, sync_ie_offset: usize) -> Result<Self, ()> {
        let mut p = Self::new(frame, header_len)?;
        p.is_eb = true;
        p.sync_ie_offset = Some(sync_ie_offset);
        Ok(p)
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

/// A frame received during an RX slot, allocated into a fixed array and
/// committed to the input ring only on successful reception (§3, §4.7).
#[derive(Clone, Debug, PartialEq)]
pub struct InputPacket {
    pub payload: Vec<u8, MAX_FRAME_LEN>,
    pub rx_asn: Asn,
    pub rssi: i16,
    pub channel: u8,
}

impl InputPacket {
    pub fn empty(rx_asn: Asn, channel: u8) -> Self {
        Self {
            payload: Vec::new(),
            rx_asn,
            rssi: 0,
            channel,
        }
    }
}
