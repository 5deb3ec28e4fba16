//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Packet`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O and the bounded receive wait.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::packet::{ChecksumKind, Packet, PacketError};

/// Maximum UDP payload size (theoretical limit; real datagrams are MTU-sized).
const MAX_DATAGRAM: usize = 65_535;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    Io(std::io::Error),
    /// An outbound packet could not be framed.
    Packet(PacketError),
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "socket I/O error: {e}"),
            Self::Packet(e) => write!(f, "packet encode error: {e}"),
        }
    }
}

impl std::error::Error for SocketError {}

impl From<std::io::Error> for SocketError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<PacketError> for SocketError {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

// ---------------------------------------------------------------------------
// Receive outcome
// ---------------------------------------------------------------------------

/// Result of one bounded receive wait.
///
/// Corruption and timer expiry are ordinary protocol events, not errors;
/// only OS-level failures surface as `Err` from [`Socket::recv_packet`].
#[derive(Debug)]
pub enum RecvOutcome {
    /// A well-formed packet and the address it came from.
    Packet(Packet, SocketAddr),
    /// A datagram arrived but failed validation; it has been discarded.
    Corrupt,
    /// Nothing arrived within the wait window.
    Timeout,
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, packet-oriented UDP socket.
///
/// All methods are `&self`; the socket is exclusively owned by one endpoint
/// and all waiting happens on the caller's task.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Encode `packet` (filling its checksum) and send the fixed-size image
    /// as a single UDP datagram to `dest`.  Returns the bytes transmitted.
    pub async fn send_packet(
        &self,
        packet: &Packet,
        dest: SocketAddr,
        checksum: ChecksumKind,
    ) -> Result<usize, SocketError> {
        let image = packet.encode(checksum)?;
        let n = self.inner.send_to(&image, dest).await?;
        Ok(n)
    }

    /// Wait up to `wait` for one inbound datagram and validate it.
    ///
    /// A datagram that fails validation (bad size, unknown kind, checksum
    /// mismatch) is reported as [`RecvOutcome::Corrupt`] and consumed; the
    /// caller decides whether to keep waiting.  No buffering happens beyond
    /// the single datagram.
    pub async fn recv_packet(
        &self,
        wait: Duration,
        checksum: ChecksumKind,
    ) -> Result<RecvOutcome, SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match timeout(wait, self.inner.recv_from(&mut buf)).await {
            Err(_elapsed) => Ok(RecvOutcome::Timeout),
            Ok(Err(e)) => Err(SocketError::Io(e)),
            Ok(Ok((n, addr))) => match Packet::decode(&buf[..n], checksum) {
                Ok(packet) => Ok(RecvOutcome::Packet(packet, addr)),
                Err(e) => {
                    log::warn!("rejecting datagram from {addr}: {e}");
                    Ok(RecvOutcome::Corrupt)
                }
            },
        }
    }
}
