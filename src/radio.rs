//! Radio driver capability set (§6) and the on/off gate policy (C4).
//!
//! Modelled as a bespoke, granular trait rather than composed from the
//! generic `radio` crate's `Transmit`/`Receive`/`State` traits: TSCH needs
//! primitives (`channel_clear`, `receiving_packet`, `pending_packet`,
//! independent `on`/`off`) that don't map cleanly onto that crate's
//! higher-level state machine. See `DESIGN.md` for the dependency-drop
//! rationale.

use crate::timer::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Ok,
    Err,
}

/// Hardware radio abstraction consumed by the TX/RX sub-procedures.
pub trait Radio {
    type Error: core::fmt::Debug;

    /// Loads `buf[..len]` into the radio's TX buffer without transmitting.
    fn prepare(&mut self, buf: &[u8], len: usize) -> Result<(), Self::Error>;

    /// Starts transmission of the previously prepared buffer.
    fn transmit(&mut self) -> Result<TxStatus, Self::Error>;

    fn on(&mut self) -> Result<(), Self::Error>;

    fn off(&mut self) -> Result<(), Self::Error>;

    /// Samples the channel once; `Ok(true)` means clear.
    fn channel_clear(&mut self) -> Result<bool, Self::Error>;

    /// True while a frame is actively being received (SFD detected).
    fn receiving_packet(&mut self) -> bool;

    /// True once a fully received frame is waiting to be read out.
    fn pending_packet(&mut self) -> bool;

    /// Reads up to `buf.len()` bytes of the pending frame; returns the
    /// number of bytes written.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error>;

    fn last_rssi(&mut self) -> i16;

    /// Hardware SFD timestamp of the last received frame, if the driver
    /// supports it (§4.7 step 7: "if high-resolution SFD timestamps are
    /// available, overwrite rx_start").
    fn last_packet_timestamp(&mut self) -> Option<Ticks> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOnCmd {
    StartOfTimeslot,
    WithinTimeslot,
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOffCmd {
    EndOfTimeslot,
    WithinTimeslot,
    Force,
}

/// Whether the radio is kept on for the whole slot or only switched on
/// around the packet exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioGatePolicy {
    pub radio_on_during_timeslot: bool,
}

/// Applies the on-command gate described in §4.4: `FORCE` always turns the
/// radio on; `StartOfTimeslot` only does so under the always-on policy;
/// `WithinTimeslot` only does so under the around-packet policy.
pub fn radio_on<R: Radio>(radio: &mut R, policy: RadioGatePolicy, cmd: RadioOnCmd) -> Result<(), R::Error> {
    let should = match cmd {
        RadioOnCmd::Force => true,
        RadioOnCmd::StartOfTimeslot => policy.radio_on_during_timeslot,
        RadioOnCmd::WithinTimeslot => !policy.radio_on_during_timeslot,
    };
    if should {
        radio.on()?;
    }
    Ok(())
}

pub fn radio_off<R: Radio>(radio: &mut R, policy: RadioGatePolicy, cmd: RadioOffCmd) -> Result<(), R::Error> {
    let should = match cmd {
        RadioOffCmd::Force => true,
        RadioOffCmd::EndOfTimeslot => policy.radio_on_during_timeslot,
        RadioOffCmd::WithinTimeslot => !policy.radio_on_during_timeslot,
    };
    if should {
        radio.off()?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::radio::{MockRadio, Transaction};

    #[test]
    fn start_of_timeslot_only_turns_on_radio_when_policy_keeps_it_on() {
        let always_on = RadioGatePolicy { radio_on_during_timeslot: true };
        let around_packet = RadioGatePolicy { radio_on_during_timeslot: false };

        let mut radio = MockRadio::new(&[Transaction::on(Ok(()))]);
        radio_on(&mut radio, always_on, RadioOnCmd::StartOfTimeslot).unwrap();
        radio.done();

        let mut radio = MockRadio::new(&[]);
        radio_on(&mut radio, around_packet, RadioOnCmd::StartOfTimeslot).unwrap();
        radio.done();
    }

    #[test]
    fn force_always_turns_on_regardless_of_policy() {
        let policy = RadioGatePolicy { radio_on_during_timeslot: false };
        let mut radio = MockRadio::new(&[Transaction::on(Ok(()))]);
        radio_on(&mut radio, policy, RadioOnCmd::Force).unwrap();
        radio.done();
    }

    #[test]
    fn within_timeslot_only_fires_under_around_packet_policy() {
        let around_packet = RadioGatePolicy { radio_on_during_timeslot: false };
        let mut radio = MockRadio::new(&[Transaction::off(Ok(()))]);
        radio_off(&mut radio, around_packet, RadioOffCmd::WithinTimeslot).unwrap();
        radio.done();

        let always_on = RadioGatePolicy { radio_on_during_timeslot: true };
        let mut radio = MockRadio::new(&[]);
        radio_off(&mut radio, always_on, RadioOffCmd::WithinTimeslot).unwrap();
        radio.done();
    }
}
