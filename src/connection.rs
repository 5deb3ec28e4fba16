//! Per-connection lifecycle: handshake, stop-and-wait data exchange, and
//! teardown.
//!
//! A [`Connection`] owns the complete state for one endpoint of a session:
//! the socket, the peer address, the FSM state, and the two alternating-bit
//! state machines ([`crate::sender`], [`crate::receiver`]).  Every operation
//! runs entirely on the caller's task — there is no background loop.  The
//! only suspension point is the bounded socket wait, whose expiry drives
//! retransmission.
//!
//! Transient conditions — timeouts, corrupted datagrams, duplicates, stale
//! acknowledgements, packets of an unexpected kind — are absorbed inside the
//! loops here and never reach the application.  Only socket failures and an
//! exhausted retry budget surface as errors; a peer's FIN observed during
//! [`recv`](Connection::recv) surfaces as [`ConnError::Eof`].

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::packet::{ChecksumKind, Packet, PacketKind};
use crate::receiver::{Disposition, Receiver};
use crate::sender::Sender;
use crate::socket::{RecvOutcome, Socket, SocketError};
use crate::state::ConnectionState;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable knobs for one endpoint.
///
/// The wire layout (MTU, header size) is fixed in [`crate::packet`];
/// everything that may legitimately vary per deployment lives here.  Both
/// peers must agree on `checksum`.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a single receive wait lasts before a retransmission fires.
    pub recv_timeout: Duration,
    /// Checksum algorithm for every packet on this connection.
    pub checksum: ChecksumKind,
    /// Cap on retransmissions per operation.  `None` retries forever, which
    /// against a dead peer means the call never returns.
    pub max_retransmits: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(1),
            checksum: ChecksumKind::Fletcher16,
            max_retransmits: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced to the application.
#[derive(Debug, Error)]
pub enum ConnError {
    /// The underlying datagram layer failed; the connection is unusable.
    #[error("transport failure: {0}")]
    Socket(#[from] SocketError),
    /// The retry budget was spent without a response from the peer.
    #[error("peer unreachable after {attempts} retransmissions")]
    Exhausted { attempts: u32 },
    /// The peer closed the connection; no further payloads will arrive.
    #[error("connection closed by peer")]
    Eof,
}

/// Retransmission budget for one blocking operation.
///
/// Only operations that retransmit (connect, send, close) consume budget;
/// pure waits are unbounded.
struct RetryBudget {
    limit: Option<u32>,
    spent: u32,
}

impl RetryBudget {
    fn new(limit: Option<u32>) -> Self {
        Self { limit, spent: 0 }
    }

    /// Account for one retransmission, failing once the cap is crossed.
    fn spend(&mut self) -> Result<(), ConnError> {
        if let Some(limit) = self.limit {
            if self.spent >= limit {
                return Err(ConnError::Exhausted { attempts: self.spent });
            }
        }
        self.spent += 1;
        Ok(())
    }
}

/// One bounded wait, reduced to what the state machines care about.
enum PeerEvent {
    /// A valid packet from the connected peer.
    Packet(Packet),
    /// Corrupt datagram, or traffic from a third party; already discarded.
    Discarded,
    /// The wait window expired.
    Timeout,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One endpoint of a reliable session over UDP.
///
/// Obtain one via [`Connection::connect`] (initiator) or
/// [`Connection::accept`] (responder).
#[derive(Debug)]
pub struct Connection {
    /// Current FSM state.
    pub state: ConnectionState,
    /// Outbound alternating-bit state.
    pub sender: Sender,
    /// Inbound alternating-bit state.
    pub receiver: Receiver,
    socket: Socket,
    peer: SocketAddr,
    config: Config,
}

impl Connection {
    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Active open with the default [`Config`].
    pub async fn connect(socket: Socket, peer: SocketAddr) -> Result<Self, ConnError> {
        Self::connect_with(socket, peer, Config::default()).await
    }

    /// Active open: send SYN, await SYN-ACK, reply ACK.
    ///
    /// The SYN is retransmitted on every timeout (consuming retry budget);
    /// corrupt datagrams and unexpected kinds are ignored.
    pub async fn connect_with(
        socket: Socket,
        peer: SocketAddr,
        config: Config,
    ) -> Result<Self, ConnError> {
        let syn = Packet::control(PacketKind::Syn, 0);
        socket.send_packet(&syn, peer, config.checksum).await?;
        log::debug!("→ SYN seq=0 to {peer}");

        let mut budget = RetryBudget::new(config.max_retransmits);
        loop {
            match socket.recv_packet(config.recv_timeout, config.checksum).await? {
                RecvOutcome::Packet(pkt, from)
                    if from == peer && pkt.kind == PacketKind::SynAck =>
                {
                    log::debug!("← SYN-ACK seq={}", pkt.seq);
                    let ack = Packet::control(PacketKind::Ack, pkt.seq);
                    socket.send_packet(&ack, peer, config.checksum).await?;
                    log::debug!("→ ACK seq={}", ack.seq);
                    log::info!("connection to {peer} established");
                    return Ok(Self {
                        state: ConnectionState::Established,
                        sender: Sender::new(),
                        receiver: Receiver::new(),
                        socket,
                        peer,
                        config,
                    });
                }
                RecvOutcome::Timeout => {
                    budget.spend()?;
                    log::warn!("timeout waiting for SYN-ACK, retransmitting SYN");
                    socket.send_packet(&syn, peer, config.checksum).await?;
                }
                RecvOutcome::Packet(..) | RecvOutcome::Corrupt => {}
            }
        }
    }

    /// Passive open with the default [`Config`].
    pub async fn accept(socket: Socket) -> Result<Self, ConnError> {
        Self::accept_with(socket, Config::default()).await
    }

    /// Passive open: await a SYN, reply SYN-ACK with `seq + 1`, then wait one
    /// timeout window for the final ACK.
    ///
    /// If the ACK does not arrive the endpoint falls back to listening; the
    /// initiator's retransmitted SYN restarts the exchange idempotently.  No
    /// half-open state survives beyond the single in-flight SYN-ACK.
    pub async fn accept_with(socket: Socket, config: Config) -> Result<Self, ConnError> {
        log::info!("listening on {}", socket.local_addr);
        loop {
            // LISTEN: anything that is not a SYN is discarded.
            let (syn, peer) = loop {
                match socket.recv_packet(config.recv_timeout, config.checksum).await? {
                    RecvOutcome::Packet(pkt, from) if pkt.kind == PacketKind::Syn => {
                        break (pkt, from)
                    }
                    _ => {}
                }
            };
            log::debug!("← SYN seq={} from {peer}", syn.seq);

            let syn_ack = Packet::control(PacketKind::SynAck, syn.seq.wrapping_add(1));
            socket.send_packet(&syn_ack, peer, config.checksum).await?;
            log::debug!("→ SYN-ACK seq={}", syn_ack.seq);

            // SYN_RECEIVED: one window for the final ACK.
            match socket.recv_packet(config.recv_timeout, config.checksum).await? {
                RecvOutcome::Packet(pkt, from)
                    if from == peer && pkt.kind == PacketKind::Ack =>
                {
                    log::debug!("← ACK seq={}", pkt.seq);
                    log::info!("connection from {peer} established");
                    return Ok(Self {
                        state: ConnectionState::Established,
                        sender: Sender::new(),
                        receiver: Receiver::new(),
                        socket,
                        peer,
                        config,
                    });
                }
                _ => {
                    log::warn!("handshake with {peer} incomplete, back to listening");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Data exchange
    // -----------------------------------------------------------------------

    /// Deliver up to [`crate::packet::DATA_SIZE`] bytes reliably, in order.
    ///
    /// The DATA packet is retransmitted on every timeout, corrupt datagram,
    /// stale DATA-ACK, or packet of an unexpected kind, until the matching
    /// DATA-ACK arrives.  Returns the number of payload bytes delivered;
    /// callers chunk larger buffers across multiple calls.
    pub async fn send(&mut self, data: &[u8]) -> Result<usize, ConnError> {
        let pkt = self.sender.next_data(data);
        let sent = pkt.payload.len();
        let mut budget = RetryBudget::new(self.config.max_retransmits);

        self.transmit(&pkt).await?;
        log::debug!("→ DATA seq={} len={}", pkt.seq, sent);

        loop {
            match self.wait_for_peer().await? {
                PeerEvent::Packet(inbound) if inbound.kind == PacketKind::DataAck => {
                    if self.sender.on_data_ack(inbound.seq) {
                        log::debug!("← DATA-ACK seq={}", inbound.seq);
                        return Ok(sent);
                    }
                    budget.spend()?;
                    log::warn!(
                        "stale DATA-ACK seq={} while awaiting seq={}, retransmitting",
                        inbound.seq,
                        pkt.seq
                    );
                    self.transmit(&pkt).await?;
                }
                PeerEvent::Timeout => {
                    budget.spend()?;
                    log::warn!("timeout awaiting DATA-ACK seq={}, retransmitting", pkt.seq);
                    self.transmit(&pkt).await?;
                }
                PeerEvent::Packet(inbound) => {
                    budget.spend()?;
                    log::warn!(
                        "unexpected {} while awaiting DATA-ACK seq={}, retransmitting",
                        inbound.kind,
                        pkt.seq
                    );
                    self.transmit(&pkt).await?;
                }
                PeerEvent::Discarded => {
                    budget.spend()?;
                    self.transmit(&pkt).await?;
                }
            }
        }
    }

    /// Receive the next in-order payload from the peer.
    ///
    /// Duplicates are re-acknowledged and suppressed; timeouts and corrupt
    /// datagrams keep the wait going.  A FIN observed here completes the
    /// passive close inline and returns [`ConnError::Eof`] — the
    /// end-of-stream marker, distinct from any byte delivery.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ConnError> {
        loop {
            match self.wait_for_peer().await? {
                PeerEvent::Packet(pkt) => match pkt.kind {
                    PacketKind::Data => match self.receiver.on_data(pkt.seq) {
                        Disposition::Deliver { ack_seq } => {
                            self.transmit(&Packet::control(PacketKind::DataAck, ack_seq))
                                .await?;
                            log::debug!(
                                "← DATA seq={} len={}; → DATA-ACK seq={ack_seq}",
                                pkt.seq,
                                pkt.payload.len()
                            );
                            return Ok(pkt.payload);
                        }
                        Disposition::Duplicate { ack_seq } => {
                            log::warn!("duplicate DATA seq={}, re-acking {ack_seq}", pkt.seq);
                            self.transmit(&Packet::control(PacketKind::DataAck, ack_seq))
                                .await?;
                        }
                    },
                    PacketKind::Fin => {
                        log::debug!("← FIN during recv");
                        self.state = ConnectionState::CloseWait;
                        self.transmit(&Packet::control(PacketKind::FinAck, 0)).await?;
                        log::debug!("→ FIN-ACK");
                        self.state = ConnectionState::Closed;
                        log::info!("connection to {} closed by peer", self.peer);
                        return Err(ConnError::Eof);
                    }
                    other => {
                        log::debug!("ignoring {other} while awaiting DATA");
                    }
                },
                PeerEvent::Discarded | PeerEvent::Timeout => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Active close: send FIN, await FIN-ACK.
    ///
    /// The FIN is retransmitted on timeout (consuming retry budget).  This is
    /// the simplified four-message close — the endpoint does not wait for a
    /// FIN of its own from the peer.
    pub async fn close(&mut self) -> Result<(), ConnError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }

        let fin = Packet::control(PacketKind::Fin, 0);
        self.transmit(&fin).await?;
        self.state = ConnectionState::FinSent;
        log::debug!("→ FIN");

        let mut budget = RetryBudget::new(self.config.max_retransmits);
        loop {
            match self.wait_for_peer().await? {
                PeerEvent::Packet(pkt) if pkt.kind == PacketKind::FinAck => {
                    log::debug!("← FIN-ACK");
                    self.state = ConnectionState::Closed;
                    log::info!("connection to {} closed", self.peer);
                    return Ok(());
                }
                PeerEvent::Timeout => {
                    budget.spend()?;
                    log::warn!("timeout awaiting FIN-ACK, retransmitting FIN");
                    self.transmit(&fin).await?;
                }
                PeerEvent::Packet(_) | PeerEvent::Discarded => {}
            }
        }
    }

    /// Passive close: wait for the peer's FIN and acknowledge it.
    ///
    /// Returns immediately when the passive close already completed inside a
    /// [`recv`](Connection::recv) call.  Everything except a FIN is ignored.
    pub async fn wait_close(&mut self) -> Result<(), ConnError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }

        loop {
            match self.wait_for_peer().await? {
                PeerEvent::Packet(pkt) if pkt.kind == PacketKind::Fin => {
                    log::debug!("← FIN");
                    self.state = ConnectionState::CloseWait;
                    self.transmit(&Packet::control(PacketKind::FinAck, 0)).await?;
                    log::debug!("→ FIN-ACK");
                    self.state = ConnectionState::Closed;
                    log::info!("connection to {} closed by peer", self.peer);
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors & helpers
    // -----------------------------------------------------------------------

    /// Address of the connected peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of the owned socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    async fn transmit(&self, pkt: &Packet) -> Result<(), ConnError> {
        self.socket
            .send_packet(pkt, self.peer, self.config.checksum)
            .await?;
        Ok(())
    }

    /// One bounded wait on the socket, filtered to the connected peer.
    async fn wait_for_peer(&self) -> Result<PeerEvent, ConnError> {
        match self
            .socket
            .recv_packet(self.config.recv_timeout, self.config.checksum)
            .await?
        {
            RecvOutcome::Packet(pkt, from) if from == self.peer => Ok(PeerEvent::Packet(pkt)),
            RecvOutcome::Packet(_, from) => {
                log::warn!("discarding datagram from unknown peer {from}");
                Ok(PeerEvent::Discarded)
            }
            RecvOutcome::Corrupt => Ok(PeerEvent::Discarded),
            RecvOutcome::Timeout => Ok(PeerEvent::Timeout),
        }
    }
}
