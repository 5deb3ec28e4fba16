//! Connection finite-state machine (FSM) types.
//!
//! This module defines every possible state a [`crate::connection::Connection`]
//! can occupy.  State transitions are *not* implemented here — they live in
//! [`crate::connection`] — but the legal paths are documented below.
//!
//! Keeping state types in their own module makes it easy to add guard logic,
//! entry/exit actions, or tracing without touching connection plumbing.

/// All possible states of the connection FSM.
///
/// ```text
//  CLOSED ──SYN sent──▶ SYN_SENT ──SYN-ACK rcvd──▶ ESTABLISHED
//  CLOSED ──listen───▶ LISTEN ──SYN rcvd──▶ SYN_RECEIVED ──ACK rcvd──▶ ESTABLISHED
//
//  ESTABLISHED ──FIN sent──▶ FIN_SENT ──FIN-ACK rcvd──▶ CLOSED
//  ESTABLISHED ──FIN rcvd──▶ CLOSE_WAIT ──FIN-ACK sent──▶ CLOSED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection exists; initial and terminal state.
    Closed,
    /// Passive open: waiting for a peer's SYN.
    Listen,
    /// SYN has been sent; waiting for SYN-ACK.
    SynSent,
    /// SYN received; SYN-ACK sent; waiting for the final ACK.
    SynReceived,
    /// Handshake complete; data transfer in progress.
    Established,
    /// Active close: FIN sent, waiting for FIN-ACK.
    FinSent,
    /// Passive close: peer's FIN received, FIN-ACK pending.
    CloseWait,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Closed
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
