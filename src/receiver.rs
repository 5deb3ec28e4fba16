//! Stop-and-wait receive-side state machine.
//!
//! [`Receiver`] tracks the expected inbound sequence bit and classifies each
//! DATA packet:
//!
//! - Expected bit → [`Disposition::Deliver`]: hand the payload up, ACK the
//!   received sequence, flip the expectation.
//! - Alternate bit → [`Disposition::Duplicate`]: a retransmission of the
//!   previously delivered packet (our ACK was lost).  Re-ACK that prior
//!   sequence; deliver nothing and do not advance.
//!
//! Because at most one packet is unacknowledged at a time, this one-bit rule
//! is exactly enough to suppress duplicates of the immediately preceding
//! packet.  This module only manages state; the caller sends the ACKs.

/// What the connection layer should do with an inbound DATA packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fresh in-order packet: ACK `ack_seq` and deliver the payload.
    Deliver { ack_seq: u32 },
    /// Retransmission of the last delivered packet: re-ACK `ack_seq`,
    /// deliver nothing.
    Duplicate { ack_seq: u32 },
}

/// Receive-side state for one connection.
#[derive(Debug, Default)]
pub struct Receiver {
    /// Sequence bit (0 or 1) the next fresh DATA packet must carry.
    expected: u32,
}

impl Receiver {
    pub fn new() -> Self {
        Self { expected: 0 }
    }

    /// Sequence bit expected on the next fresh DATA packet.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Classify an inbound DATA packet by its sequence bit.
    pub fn on_data(&mut self, seq: u32) -> Disposition {
        if seq == self.expected {
            let ack_seq = self.expected;
            self.expected ^= 1;
            Disposition::Deliver { ack_seq }
        } else {
            Disposition::Duplicate {
                ack_seq: self.expected ^ 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_expectation_is_zero() {
        let r = Receiver::new();
        assert_eq!(r.expected(), 0);
    }

    #[test]
    fn expected_packet_delivered_and_acked() {
        let mut r = Receiver::new();
        assert_eq!(r.on_data(0), Disposition::Deliver { ack_seq: 0 });
        assert_eq!(r.expected(), 1);
    }

    #[test]
    fn duplicate_reacked_without_delivery() {
        let mut r = Receiver::new();
        r.on_data(0);
        // Retransmission of seq 0 after our ACK was lost.
        assert_eq!(r.on_data(0), Disposition::Duplicate { ack_seq: 0 });
        assert_eq!(r.expected(), 1, "expectation must not advance on a duplicate");
    }

    #[test]
    fn k_retransmissions_deliver_exactly_once() {
        let mut r = Receiver::new();
        let mut delivered = 0;
        let mut acks = 0;
        for _ in 0..5 {
            match r.on_data(0) {
                Disposition::Deliver { ack_seq } => {
                    delivered += 1;
                    assert_eq!(ack_seq, 0);
                    acks += 1;
                }
                Disposition::Duplicate { ack_seq } => {
                    assert_eq!(ack_seq, 0);
                    acks += 1;
                }
            }
        }
        assert_eq!(delivered, 1);
        assert_eq!(acks, 5);
    }

    #[test]
    fn alternating_stream_all_delivered() {
        let mut r = Receiver::new();
        for i in 0..8u32 {
            let bit = i % 2;
            assert_eq!(r.on_data(bit), Disposition::Deliver { ack_seq: bit });
        }
        assert_eq!(r.expected(), 0);
    }

    #[test]
    fn stale_duplicate_between_deliveries_reacked() {
        let mut r = Receiver::new();
        assert_eq!(r.on_data(0), Disposition::Deliver { ack_seq: 0 });
        // Stale copy of seq 0 shows up while we wait for seq 1.
        assert_eq!(r.on_data(0), Disposition::Duplicate { ack_seq: 0 });
        // The genuine seq 1 still lands.
        assert_eq!(r.on_data(1), Disposition::Deliver { ack_seq: 1 });
    }

    #[test]
    fn duplicate_of_second_packet_reacks_its_bit() {
        let mut r = Receiver::new();
        r.on_data(0);
        r.on_data(1);
        assert_eq!(r.on_data(1), Disposition::Duplicate { ack_seq: 1 });
        assert_eq!(r.expected(), 0);
    }
}
