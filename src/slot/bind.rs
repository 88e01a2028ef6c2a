//! Link binding (C5, §4.5): selecting the packet and neighbor a given
//! link acts on for the current slot.

use crate::collaborators::SlotCollaborators;
use crate::link::{Link, LinkType};
use crate::neighbor::{NeighborId, PacketId};

pub struct Selection {
    pub packet: Option<PacketId>,
    pub neighbor: Option<NeighborId>,
}

/// Implements §4.5's `select(link) -> (packet, neighbor)`.
pub fn select<C: SlotCollaborators>(collaborators: &mut C, link: &Link<C::Addr>) -> Selection {
    if link.is_tx() {
        if link.is_advertising() {
            let eb = collaborators.eb_neighbor();
            let packet = collaborators.packet_for_neighbor(eb, link);
            if packet.is_some() || is_advertising_only(link) {
                return Selection { packet, neighbor: Some(eb) };
            }
            // Plain ADVERTISING links fall through to the peer-address
            // queue below when the EB queue has nothing ready.
        }

        let nbr = match collaborators.neighbor_for_address(&link.peer_address) {
            Some(n) => n,
            None => return Selection { packet: None, neighbor: None },
        };

        let is_broadcast = collaborators.neighbor(nbr).is_broadcast;
        if is_broadcast {
            if let Some(packet) = collaborators.packet_for_neighbor(nbr, link) {
                return Selection { packet: Some(packet), neighbor: Some(nbr) };
            }
            // Scan unicast neighbors for anything eligible over this link.
            if let Some((any_nbr, packet)) = collaborators.unicast_packet_for_any(link) {
                return Selection { packet: Some(packet), neighbor: Some(any_nbr) };
            }
            return Selection { packet: None, neighbor: Some(nbr) };
        }

        let packet = collaborators.packet_for_neighbor(nbr, link);
        Selection { packet, neighbor: Some(nbr) }
    } else {
        Selection { packet: None, neighbor: None }
    }
}

/// `ADVERTISING_ONLY` links never fall through to a data packet even if the
/// EB queue was empty -- callers of `select` that need that distinction
/// check `link.link_type` directly.
pub fn is_advertising_only<A>(link: &Link<A>) -> bool {
    matches!(link.link_type, LinkType::AdvertisingOnly)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::asn::Asn;
    use crate::collaborators::{EackInfo, NextLink, ParsedHeader};
    use crate::link::LinkOptions;
    use crate::neighbor::Neighbor;
    use crate::packet::{Packet, MAX_FRAME_LEN};
    use heapless::Vec;

    struct TestCollaborators {
        neighbors: std::vec::Vec<Neighbor<u16>>,
        packets: std::vec::Vec<(NeighborId, Packet)>,
    }

    impl SlotCollaborators for TestCollaborators {
        type Addr = u16;

        fn next_active_link(&mut self, _asn: Asn) -> NextLink<u16> {
            NextLink { link: None, slots_until: 1, backup_link: None }
        }

        fn eb_neighbor(&self) -> NeighborId {
            NeighborId(0)
        }
        fn broadcast_neighbor(&self) -> NeighborId {
            NeighborId(1)
        }
        fn neighbor_for_address(&mut self, addr: &u16) -> Option<NeighborId> {
            self.neighbors.iter().position(|n| n.address == *addr).map(NeighborId)
        }
        fn packet_for_neighbor(&mut self, nbr: NeighborId, _link: &Link<u16>) -> Option<PacketId> {
            self.packets.iter().position(|(n, _)| *n == nbr).map(PacketId)
        }
        fn unicast_packet_for_any(&mut self, _link: &Link<u16>) -> Option<(NeighborId, PacketId)> {
            self.packets
                .iter()
                .enumerate()
                .find(|(_, (n, _))| !self.neighbors[n.0].is_broadcast)
                .map(|(i, (n, _))| (*n, PacketId(i)))
        }
        fn remove_packet_from_queue(&mut self, _nbr: NeighborId, _pkt: PacketId) {}
        fn queue_is_empty(&self, _nbr: NeighborId) -> bool {
            true
        }
        fn backoff_reset(&mut self, _nbr: NeighborId) {}
        fn backoff_inc(&mut self, _nbr: NeighborId) {}
        fn update_all_backoff_windows(&mut self, _link_addr: &u16) {}
        fn neighbor(&self, nbr: NeighborId) -> &Neighbor<u16> {
            &self.neighbors[nbr.0]
        }
        fn packet(&self, pkt: PacketId) -> &Packet {
            &self.packets[pkt.0].1
        }
        fn packet_mut(&mut self, pkt: PacketId) -> &mut Packet {
            &mut self.packets[pkt.0].1
        }
        fn prepare_tx_frame(&mut self, _pkt: PacketId, _asn: Asn, _scratch: &mut [u8; MAX_FRAME_LEN]) -> Result<usize, ()> {
            Ok(0)
        }
        fn parse_header(&self, _buf: &[u8]) -> Option<ParsedHeader<u16>> {
            None
        }
        fn validate_rx_frame(&mut self, _buf: &mut Vec<u8, MAX_FRAME_LEN>, _header: &ParsedHeader<u16>, _asn: Asn) -> bool {
            false
        }
        fn build_eack(&mut self, _buf: &mut [u8; MAX_FRAME_LEN], _dest: &u16, _seq: u8, _drift_us: i32, _nack: bool, _asn: Asn) -> Option<usize> {
            None
        }
        fn parse_and_authenticate_eack(&mut self, _buf: &[u8], _expected_seq: u8, _source: &u16, _asn: Asn) -> Option<EackInfo> {
            None
        }
        fn should_nack(&mut self, _link: &Link<u16>, _source: &u16, _destination: &u16) -> bool {
            false
        }
        fn timesync_update(&mut self, _nbr: NeighborId, _slots_since_last_sync: i64, _drift_ticks: i32) {}
        fn adaptive_compensate(&mut self, _wake_offset_ticks: i64) -> i64 {
            0
        }
        fn schedule_keepalive(&mut self) {}
        fn poll_pending_events(&mut self) {}
    }

    fn link(addr: u16, options: LinkOptions) -> Link<u16> {
        Link {
            slot_offset: 0,
            channel_offset: 0,
            options,
            link_type: LinkType::Normal,
            peer_address: addr,
        }
    }

    #[test]
    fn selects_dedicated_unicast_packet() {
        let mut c = TestCollaborators {
            neighbors: std::vec![Neighbor::new(0xAAAA, 1), Neighbor::broadcast(0xFFFF)],
            packets: std::vec![(NeighborId(0), Packet::new(&[1, 2, 3], 1).unwrap())],
        };
        let l = link(0xAAAA, LinkOptions::TX);
        let sel = select(&mut c, &l);
        assert_eq!(sel.neighbor, Some(NeighborId(0)));
        assert_eq!(sel.packet, Some(PacketId(0)));
    }

    #[test]
    fn broadcast_link_falls_back_to_any_unicast_packet() {
        let mut c = TestCollaborators {
            neighbors: std::vec![Neighbor::new(0xAAAA, 1), Neighbor::broadcast(0xFFFF)],
            packets: std::vec![(NeighborId(0), Packet::new(&[1, 2, 3], 1).unwrap())],
        };
        let l = link(0xFFFF, LinkOptions::TX | LinkOptions::SHARED);
        let sel = select(&mut c, &l);
        assert_eq!(sel.neighbor, Some(NeighborId(0)));
        assert_eq!(sel.packet, Some(PacketId(0)));
    }

    #[test]
    fn rx_only_link_selects_nothing() {
        let mut c = TestCollaborators { neighbors: std::vec![], packets: std::vec![] };
        let l = link(0, LinkOptions::RX);
        let sel = select(&mut c, &l);
        assert_eq!(sel.packet, None);
        assert_eq!(sel.neighbor, None);
    }
}
