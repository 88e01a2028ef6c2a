//! Schedule entries (§3): links/cells binding a slot-offset and
//! channel-offset to an action and peer. Owned by the external `Schedule`
//! collaborator.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LinkOptions: u8 {
        const TX = 0b0001;
        const RX = 0b0010;
        const SHARED = 0b0100;
        const TIME_KEEPING = 0b1000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    Normal,
    Advertising,
    AdvertisingOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link<A> {
    pub slot_offset: u16,
    pub channel_offset: u8,
    pub options: LinkOptions,
    pub link_type: LinkType,
    pub peer_address: A,
}

impl<A> Link<A> {
    pub fn is_tx(&self) -> bool {
        self.options.contains(LinkOptions::TX)
    }

    pub fn is_rx(&self) -> bool {
        self.options.contains(LinkOptions::RX)
    }

    pub fn is_shared(&self) -> bool {
        self.options.contains(LinkOptions::SHARED)
    }

    pub fn is_advertising(&self) -> bool {
        matches!(self.link_type, LinkType::Advertising | LinkType::AdvertisingOnly)
    }
}
