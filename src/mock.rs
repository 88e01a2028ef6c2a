//! Test-only fixtures (A5): an expectation-list `MockRadio` implementing
//! this crate's own `Radio` trait, following the collaborator crate's own
//! `radio::mock::{MockRadio, Transaction}` pattern (`Transaction::get_state`,
//! `Transaction::start_transmit`, ...) adapted to the TSCH `Radio` trait's
//! operations. `timer::mock::MockTimer` is the `HwTimer` counterpart.

#[cfg(any(test, feature = "mocks"))]
pub mod radio {
    extern crate std;

    use crate::radio::{Radio, TxStatus};
    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Transaction {
        Prepare { buf: StdVec<u8>, result: Result<(), ()> },
        Transmit { result: Result<TxStatus, ()> },
        On { result: Result<(), ()> },
        Off { result: Result<(), ()> },
        ChannelClear { result: Result<bool, ()> },
        ReceivingPacket { result: bool },
        PendingPacket { result: bool },
        Read { data: StdVec<u8> },
        SetChannel { channel: u8, result: Result<(), ()> },
    }

    impl Transaction {
        pub fn prepare(buf: &[u8], result: Result<(), ()>) -> Self {
            Transaction::Prepare { buf: buf.to_vec(), result }
        }
        pub fn transmit(result: Result<TxStatus, ()>) -> Self {
            Transaction::Transmit { result }
        }
        pub fn on(result: Result<(), ()>) -> Self {
            Transaction::On { result }
        }
        pub fn off(result: Result<(), ()>) -> Self {
            Transaction::Off { result }
        }
        pub fn channel_clear(result: Result<bool, ()>) -> Self {
            Transaction::ChannelClear { result }
        }
        pub fn receiving_packet(result: bool) -> Self {
            Transaction::ReceivingPacket { result }
        }
        pub fn pending_packet(result: bool) -> Self {
            Transaction::PendingPacket { result }
        }
        pub fn read(data: &[u8]) -> Self {
            Transaction::Read { data: data.to_vec() }
        }
        pub fn set_channel(channel: u8, result: Result<(), ()>) -> Self {
            Transaction::SetChannel { channel, result }
        }
    }

    pub struct MockRadio {
        expected: VecDeque<Transaction>,
    }

    impl MockRadio {
        pub fn new(transactions: &[Transaction]) -> Self {
            Self { expected: transactions.iter().cloned().collect() }
        }

        pub fn expect(&mut self, transactions: &[Transaction]) {
            self.expected.extend(transactions.iter().cloned());
        }

        /// Asserts every expected transaction was consumed.
        pub fn done(&self) {
            assert!(self.expected.is_empty(), "unconsumed mock radio transactions: {:?}", self.expected);
        }

        fn next(&mut self) -> Transaction {
            self.expected.pop_front().expect("no more mock radio transactions expected")
        }
    }

    impl Radio for MockRadio {
        type Error = ();

        fn prepare(&mut self, buf: &[u8], len: usize) -> Result<(), Self::Error> {
            match self.next() {
                Transaction::Prepare { buf: expected, result } => {
                    assert_eq!(&buf[..len], expected.as_slice());
                    result
                }
                other => panic!("expected {:?}, got prepare()", other),
            }
        }

        fn transmit(&mut self) -> Result<TxStatus, Self::Error> {
            match self.next() {
                Transaction::Transmit { result } => result,
                other => panic!("expected {:?}, got transmit()", other),
            }
        }

        fn on(&mut self) -> Result<(), Self::Error> {
            match self.next() {
                Transaction::On { result } => result,
                other => panic!("expected {:?}, got on()", other),
            }
        }

        fn off(&mut self) -> Result<(), Self::Error> {
            match self.next() {
                Transaction::Off { result } => result,
                other => panic!("expected {:?}, got off()", other),
            }
        }

        fn channel_clear(&mut self) -> Result<bool, Self::Error> {
            match self.next() {
                Transaction::ChannelClear { result } => result,
                other => panic!("expected {:?}, got channel_clear()", other),
            }
        }

        fn receiving_packet(&mut self) -> bool {
            match self.next() {
                Transaction::ReceivingPacket { result } => result,
                other => panic!("expected {:?}, got receiving_packet()", other),
            }
        }

        fn pending_packet(&mut self) -> bool {
            match self.next() {
                Transaction::PendingPacket { result } => result,
                other => panic!("expected {:?}, got pending_packet()", other),
            }
        }

        fn read(&mut self, buf: &mut [u8]) -> usize {
            match self.next() {
                Transaction::Read { data } => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    n
                }
                other => panic!("expected {:?}, got read()", other),
            }
        }

        fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
            match self.next() {
                Transaction::SetChannel { channel: expected, result } => {
                    assert_eq!(channel, expected);
                    result
                }
                other => panic!("expected {:?}, got set_channel()", other),
            }
        }

        fn last_rssi(&mut self) -> i16 {
            -60
        }
    }
}
