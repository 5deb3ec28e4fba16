//! `rudp` — a reliable datagram transport over UDP.
//!
//! One initiator and one responder exchange a stream of bounded payloads
//! with in-order delivery, checksum-based corruption detection, and
//! timeout-driven retransmission.  Setup is a three-message handshake
//! (SYN / SYN-ACK / ACK); teardown is a four-message exchange
//! (FIN / FIN-ACK on each side).  The data channel is stop-and-wait: one
//! DATA packet in flight, acknowledged by a matching DATA-ACK, with a
//! single alternating sequence bit telling fresh packets from duplicates.
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────┐ send/recv/close  ┌────────────────────────────┐
//!  │ Application │─────────────────▶│        Connection          │
//!  └─────────────┘                  │ (handshake, stop-and-wait, │
//!                                   │  teardown state machines)  │
//!                                   └──────┬──────────┬──────────┘
//!                                          │          │
//!                                 ┌────────▼───┐ ┌────▼─────┐
//!                                 │   Sender   │ │ Receiver │   (pure
//!                                 │  seq bit   │ │ expected │  alternating-
//!                                 └────────────┘ │   bit    │  bit state)
//!                                                └──────────┘
//!                                   ┌──────────┐
//!                                   │  Socket  │  packets ⇄ datagrams,
//!                                   └────┬─────┘  bounded-wait receive
//!                                        │ raw UDP
//!                                   ┌────▼─────┐
//!                                   │  Packet  │  fixed 1024-byte image,
//!                                   └──────────┘  checksum compute/verify
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     — wire format and checksum (serialise / deserialise)
//! - [`socket`]     — async UDP socket speaking packets
//! - [`state`]      — finite-state-machine types
//! - [`sender`]     — outbound alternating-bit state
//! - [`receiver`]   — inbound alternating-bit state
//! - [`connection`] — per-connection lifecycle and retransmission loops
//! - [`simulator`]  — lossy/corrupting relay for testing
//!
//! All work happens on the calling task; the library spawns nothing.

pub mod connection;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod state;
