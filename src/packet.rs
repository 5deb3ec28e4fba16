//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged between peers is a [`Packet`] serialised into a
//! fixed [`MTU`]-byte image.  This module is responsible for:
//! - Defining the on-wire binary layout (header fields, payload area).
//! - Serialising a [`Packet`] into the image, filling in the checksum.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed, truncated, or corrupted input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//!   0      4    kind          (u32, big-endian)
//!   4      4    seq           (u32, big-endian)
//!   8      4    checksum      (u32, big-endian)
//!  12      4    data_length   (u32, big-endian)
//!  16   1008    data          (payload; unused tail zeroed)
//! ```
//!
//! The checksum is computed over the full image with the checksum field
//! zeroed, then patched in.  Field order and byte order are fixed, so two
//! peers on different architectures interoperate.

use std::fmt;

use thiserror::Error;

/// Total size of every datagram on the wire, in bytes.
pub const MTU: usize = 1024;

/// Fixed header bytes: kind, seq, checksum, and data_length, each a `u32`.
pub const HEADER_SIZE: usize = 16;

/// Payload capacity of a single DATA packet.
pub const DATA_SIZE: usize = MTU - HEADER_SIZE;

/// Byte offset of the checksum field inside the image.
const CHECKSUM_OFFSET: usize = 8;

// ---------------------------------------------------------------------------
// Packet kinds
// ---------------------------------------------------------------------------

/// Message-kind tag carried in the first header field.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Handshake initiation.
    Syn = 1,
    /// Handshake reply; `seq` is the received SYN's `seq + 1`.
    SynAck = 2,
    /// Final handshake message; `seq` echoes the SYN-ACK's.
    Ack = 3,
    /// Application payload; `seq` is the alternating bit.
    Data = 4,
    /// Acknowledges the DATA packet with the same `seq`.
    DataAck = 5,
    /// Teardown initiation.
    Fin = 6,
    /// Acknowledges a FIN.
    FinAck = 7,
}

impl PacketKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => PacketKind::Syn,
            2 => PacketKind::SynAck,
            3 => PacketKind::Ack,
            4 => PacketKind::Data,
            5 => PacketKind::DataAck,
            6 => PacketKind::Fin,
            7 => PacketKind::FinAck,
            _ => return None,
        })
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Syn => "SYN",
            PacketKind::SynAck => "SYN-ACK",
            PacketKind::Ack => "ACK",
            PacketKind::Data => "DATA",
            PacketKind::DataAck => "DATA-ACK",
            PacketKind::Fin => "FIN",
            PacketKind::FinAck => "FIN-ACK",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Checksum algorithm used for the wire image.  Both peers must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumKind {
    /// Header fields plus byte-wise payload sum, wrapping `u32` arithmetic.
    /// Detects random single-byte flips but misses permutations.
    Additive,
    /// Fletcher-16 over the whole image: two running modulo-255 sums packed
    /// into the low 16 bits.  Position-sensitive, so the preferred default.
    #[default]
    Fletcher16,
}

/// Compute the checksum of a full [`MTU`]-byte image whose checksum field
/// is zeroed.
fn compute_checksum(kind: ChecksumKind, image: &[u8]) -> u32 {
    debug_assert_eq!(image.len(), MTU);
    match kind {
        ChecksumKind::Additive => {
            let field = |at: usize| u32::from_be_bytes(image[at..at + 4].try_into().unwrap());
            let mut sum = field(0).wrapping_add(field(4)).wrapping_add(field(12));
            for &byte in &image[HEADER_SIZE..] {
                sum = sum.wrapping_add(byte as u32);
            }
            sum
        }
        ChecksumKind::Fletcher16 => {
            let mut sum1: u32 = 0;
            let mut sum2: u32 = 0;
            for &byte in image {
                sum1 = (sum1 + byte as u32) % 255;
                sum2 = (sum2 + sum1) % 255;
            }
            (sum2 << 8) | sum1
        }
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A protocol datagram: kind tag, sequence field, payload bytes.
///
/// `data_length` on the wire is derived from `payload.len()`; control packets
/// carry an empty payload and a zero-filled data area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub seq: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a payload-less control packet (SYN, SYN-ACK, ACK, FIN, FIN-ACK).
    pub fn control(kind: PacketKind, seq: u32) -> Self {
        Self {
            kind,
            seq,
            payload: Vec::new(),
        }
    }

    /// Build a DATA packet carrying `payload`.
    pub fn data(seq: u32, payload: &[u8]) -> Self {
        Self {
            kind: PacketKind::Data,
            seq,
            payload: payload.to_vec(),
        }
    }

    /// Serialise this packet into a freshly allocated [`MTU`]-byte image,
    /// computing and filling in the checksum field.
    pub fn encode(&self, checksum: ChecksumKind) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > DATA_SIZE {
            return Err(PacketError::PayloadTooLarge(self.payload.len()));
        }

        let mut image = vec![0u8; MTU];
        image[0..4].copy_from_slice(&self.kind.to_u32().to_be_bytes());
        image[4..8].copy_from_slice(&self.seq.to_be_bytes());
        // checksum field stays zero while the sum is taken
        image[12..16].copy_from_slice(&(self.payload.len() as u32).to_be_bytes());
        image[HEADER_SIZE..HEADER_SIZE + self.payload.len()].copy_from_slice(&self.payload);

        let sum = compute_checksum(checksum, &image);
        image[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&sum.to_be_bytes());
        Ok(image)
    }

    /// Parse a [`Packet`] from a raw datagram, verifying the checksum.
    ///
    /// The image must be exactly [`MTU`] bytes; the full payload area is
    /// transmitted every packet and only `data_length` bytes of it are kept.
    pub fn decode(buf: &[u8], checksum: ChecksumKind) -> Result<Self, PacketError> {
        if buf.len() != MTU {
            return Err(PacketError::WrongSize(buf.len()));
        }

        let stored =
            u32::from_be_bytes(buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].try_into().unwrap());
        let mut image = buf.to_vec();
        image[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);
        let computed = compute_checksum(checksum, &image);
        if stored != computed {
            return Err(PacketError::ChecksumFailed { stored, computed });
        }

        let tag = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let kind = PacketKind::from_u32(tag).ok_or(PacketError::UnknownKind(tag))?;
        let seq = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let data_length = u32::from_be_bytes(buf[12..16].try_into().unwrap()) as usize;
        if data_length > DATA_SIZE {
            return Err(PacketError::LengthMismatch(data_length as u32));
        }

        Ok(Self {
            kind,
            seq,
            payload: buf[HEADER_SIZE..HEADER_SIZE + data_length].to_vec(),
        })
    }
}

/// Errors that can arise when building or parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram is not exactly [`MTU`] bytes.
    #[error("datagram is {0} bytes, expected {MTU}")]
    WrongSize(usize),
    /// Payload exceeds [`DATA_SIZE`] and cannot be framed.
    #[error("payload of {0} bytes exceeds capacity of {DATA_SIZE}")]
    PayloadTooLarge(usize),
    /// The kind tag is outside the defined set.
    #[error("unknown packet kind tag {0}")]
    UnknownKind(u32),
    /// The `data_length` field exceeds the payload area.
    #[error("data_length {0} exceeds capacity of {DATA_SIZE}")]
    LengthMismatch(u32),
    /// Recomputed checksum does not match the stored value.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumFailed { stored: u32, computed: u32 },
}
