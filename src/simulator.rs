//! Fault-injecting network simulator for deterministic testing.
//!
//! Real networks drop, corrupt, and duplicate packets; loopback does none of
//! that.  [`Simulator`] is a UDP relay that sits between the two endpoints
//! and applies a configurable fault model to every forwarded datagram:
//!
//! | Fault       | Description                                         |
//! |-------------|-----------------------------------------------------|
//! | Loss        | Drop a datagram (scripted, or with `loss_rate`).    |
//! | Corruption  | Flip a payload bit so the checksum fails.           |
//! | Duplication | Deliver a datagram twice back to back.              |
//!
//! Scripted faults target the nth occurrence of a packet kind, which lets a
//! test say "drop the first SYN" or "corrupt the first DATA" and observe the
//! recovery path.  Probabilistic faults draw from an RNG seeded via
//! [`SimulatorConfig::seed`], so a failing run reproduces exactly.
//!
//! The relay learns the downstream (client) address from the first inbound
//! datagram and forwards everything else to the fixed upstream address, so a
//! test points the initiator at [`Simulator::addr`] instead of the real peer.

use std::collections::HashMap;
use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::packet::PacketKind;

// ---------------------------------------------------------------------------
// Fault model
// ---------------------------------------------------------------------------

/// A scripted fault applied to the nth (1-based) datagram of a given kind,
/// counted across both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Silently drop the datagram.
    Drop { kind: PacketKind, nth: u32 },
    /// Flip one payload bit so the receiver's checksum check rejects it.
    Corrupt { kind: PacketKind, nth: u32 },
    /// Forward the datagram twice.
    Duplicate { kind: PacketKind, nth: u32 },
}

/// Fault model for one simulator instance.
///
/// The default is a transparent pass-through.  Scripted faults are matched
/// before the probabilistic model.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// Probability in `[0, 1]` that any forwarded datagram is dropped.
    pub loss_rate: f64,
    /// Probability in `[0, 1]` that a forwarded datagram gets a bit flipped.
    pub corrupt_rate: f64,
    /// Seed for the probabilistic faults.
    pub seed: u64,
    /// Deterministic, occurrence-targeted faults.
    pub scripted: Vec<Fault>,
}

enum Action {
    Forward,
    ForwardTwice,
    Drop,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// A relay shuttling datagrams between one downstream endpoint and one
/// upstream endpoint while applying [`SimulatorConfig`] faults.
pub struct Simulator {
    /// Address the downstream endpoint should talk to instead of the peer.
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl Simulator {
    /// Bind a relay socket on loopback and start forwarding to `upstream`.
    pub async fn spawn(
        upstream: SocketAddr,
        config: SimulatorConfig,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let handle = tokio::spawn(relay_loop(socket, upstream, config));
        Ok(Self { addr, handle })
    }

    /// Stop forwarding and release the relay socket.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn relay_loop(socket: UdpSocket, upstream: SocketAddr, config: SimulatorConfig) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut downstream: Option<SocketAddr> = None;
    let mut seen: HashMap<u32, u32> = HashMap::new();
    let mut buf = vec![0u8; 2048];

    loop {
        let (n, from) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(_) => return,
        };

        let dest = if from == upstream {
            match downstream {
                Some(d) => d,
                // Upstream spoke before any downstream appeared; nowhere to go.
                None => continue,
            }
        } else {
            downstream = Some(from);
            upstream
        };

        let mut frame = buf[..n].to_vec();
        match apply_faults(&mut frame, &config, &mut seen, &mut rng) {
            Action::Drop => {}
            Action::Forward => {
                let _ = socket.send_to(&frame, dest).await;
            }
            Action::ForwardTwice => {
                let _ = socket.send_to(&frame, dest).await;
                let _ = socket.send_to(&frame, dest).await;
            }
        }
    }
}

fn apply_faults(
    frame: &mut [u8],
    config: &SimulatorConfig,
    seen: &mut HashMap<u32, u32>,
    rng: &mut StdRng,
) -> Action {
    // Peek the kind tag without a full decode; unparseable frames pass through.
    let kind = frame
        .get(0..4)
        .map(|b| u32::from_be_bytes(b.try_into().unwrap()))
        .and_then(PacketKind::from_u32);

    if let Some(kind) = kind {
        let occurrence = seen.entry(kind.to_u32()).or_insert(0);
        *occurrence += 1;

        for fault in &config.scripted {
            match *fault {
                Fault::Drop { kind: k, nth } if k == kind && nth == *occurrence => {
                    log::debug!("simulator: dropping {kind} #{occurrence}");
                    return Action::Drop;
                }
                Fault::Corrupt { kind: k, nth } if k == kind && nth == *occurrence => {
                    log::debug!("simulator: corrupting {kind} #{occurrence}");
                    flip_payload_bit(frame);
                    return Action::Forward;
                }
                Fault::Duplicate { kind: k, nth } if k == kind && nth == *occurrence => {
                    log::debug!("simulator: duplicating {kind} #{occurrence}");
                    return Action::ForwardTwice;
                }
                _ => {}
            }
        }
    }

    if config.loss_rate > 0.0 && rng.gen_bool(config.loss_rate) {
        log::debug!("simulator: random drop");
        return Action::Drop;
    }
    if config.corrupt_rate > 0.0 && rng.gen_bool(config.corrupt_rate) {
        log::debug!("simulator: random corruption");
        flip_payload_bit(frame);
    }
    Action::Forward
}

/// Flip the lowest bit of the final byte — inside the payload area for any
/// full-size image, so the header still parses but the checksum fails.
fn flip_payload_bit(frame: &mut [u8]) {
    if let Some(last) = frame.last_mut() {
        *last ^= 0x01;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ChecksumKind, Packet};

    #[test]
    fn scripted_fault_targets_nth_occurrence() {
        let config = SimulatorConfig {
            scripted: vec![Fault::Drop {
                kind: PacketKind::Data,
                nth: 2,
            }],
            ..Default::default()
        };
        let mut seen = HashMap::new();
        let mut rng = StdRng::seed_from_u64(0);

        let mut first = Packet::data(0, b"a").encode(ChecksumKind::Fletcher16).unwrap();
        let mut second = Packet::data(1, b"b").encode(ChecksumKind::Fletcher16).unwrap();

        assert!(matches!(
            apply_faults(&mut first, &config, &mut seen, &mut rng),
            Action::Forward
        ));
        assert!(matches!(
            apply_faults(&mut second, &config, &mut seen, &mut rng),
            Action::Drop
        ));
    }

    #[test]
    fn corruption_breaks_checksum_only() {
        let config = SimulatorConfig {
            scripted: vec![Fault::Corrupt {
                kind: PacketKind::Data,
                nth: 1,
            }],
            ..Default::default()
        };
        let mut seen = HashMap::new();
        let mut rng = StdRng::seed_from_u64(0);

        let mut frame = Packet::data(0, b"payload")
            .encode(ChecksumKind::Fletcher16)
            .unwrap();
        apply_faults(&mut frame, &config, &mut seen, &mut rng);

        assert!(matches!(
            Packet::decode(&frame, ChecksumKind::Fletcher16),
            Err(crate::packet::PacketError::ChecksumFailed { .. })
        ));
    }

    #[test]
    fn occurrence_counter_is_per_kind() {
        let config = SimulatorConfig {
            scripted: vec![Fault::Drop {
                kind: PacketKind::DataAck,
                nth: 1,
            }],
            ..Default::default()
        };
        let mut seen = HashMap::new();
        let mut rng = StdRng::seed_from_u64(0);

        // Ten DATA frames pass untouched before the first DATA-ACK is hit.
        for i in 0..10u32 {
            let mut frame = Packet::data(i % 2, b"d")
                .encode(ChecksumKind::Fletcher16)
                .unwrap();
            assert!(matches!(
                apply_faults(&mut frame, &config, &mut seen, &mut rng),
                Action::Forward
            ));
        }
        let mut ack = Packet::control(PacketKind::DataAck, 0)
            .encode(ChecksumKind::Fletcher16)
            .unwrap();
        assert!(matches!(
            apply_faults(&mut ack, &config, &mut seen, &mut rng),
            Action::Drop
        ));
    }

    #[test]
    fn seeded_random_faults_reproduce() {
        let config = SimulatorConfig {
            loss_rate: 0.5,
            seed: 42,
            ..Default::default()
        };
        let run = || {
            let mut seen = HashMap::new();
            let mut rng = StdRng::seed_from_u64(config.seed);
            (0..32)
                .map(|_| {
                    let mut frame = Packet::data(0, b"x")
                        .encode(ChecksumKind::Fletcher16)
                        .unwrap();
                    matches!(
                        apply_faults(&mut frame, &config, &mut seen, &mut rng),
                        Action::Drop
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
