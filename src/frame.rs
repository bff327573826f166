/*! Link-layer frame decoding.

An on-air packet, after clock recovery, is a whitened HDLC-like bit
stream. Getting the frame out takes, in order:

1. Unpack the hex bytes to bits, MSB first.
2. Invert every bit (the on-air NRZ convention).
3. Run the [multiplicative descrambler](crate::descrambler).
4. Invert again.
5. Remove the bit stuffing: a zero after five ones is stuffed, a run
   of exactly six ones flips the in-frame state, more is an error.
6. Reverse the bit order within each successive 8-bit group.
7. Pack into 4-bit nibbles and validate the CRC.

All of it composes into a single pass per frame; only the destuffed
bit vector is materialised. The result is a [`Frame`]: 84 nibbles with
a verified checksum, ready for [field
extraction](crate::telemetry::TelemetryRecord::from_frame).
*/
use itertools::Itertools;

use crate::descrambler::{Descrambler, TAPS};

/// Nibble count of a complete frame.
pub const FRAME_NIBBLES: usize = 84;

/// CRC register initialisation value.
pub const CRC_INIT: u16 = 0xFFFF;

/// CRC residual of a good frame, checksum nibbles included.
pub const CRC_GOOD: u16 = 0xF0B8;

/// First nibble of every frame.
pub const START_MARK: u8 = 0x9;

/// Why a frame failed to decode.
///
/// Every decode failure is typed; nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// More than six consecutive ones in the stuffed stream.
    #[error("wrong bit stuffing: {0} consecutive ones")]
    MalformedStuffing(usize),

    /// The destuffed, shuffled frame was not exactly 84 nibbles.
    #[error("wrong length: {0} nibbles")]
    WrongLength(usize),

    /// The CRC residual did not match [`CRC_GOOD`].
    #[error("CRC mismatch: {0:#06x} != {CRC_GOOD:#06x}")]
    CrcMismatch(u16),

    /// The first nibble was not [`START_MARK`].
    #[error("unknown start mark: {0:#x}")]
    BadStartMark(u8),

    /// A reserved padding region (1 through 4) held a nonzero value.
    #[error("padding {0} not zero")]
    NonZeroReserved(usize),

    /// The flags nibble was neither 0x0 nor 0x8.
    #[error("unknown flag value: {0:#x}")]
    BadFlag(u8),
}

/// Unpack bytes into bits, MSB first.
pub fn unpack_bits(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |n| byte >> n & 1))
}

#[derive(PartialEq)]
enum Framing {
    OutOfFrame,
    InFrame,
}

/// Reverse the bit stuffing.
///
/// One zero is stuffed after five consecutive ones; six consecutive
/// ones are a frame boundary. Bits outside a frame are suppressed.
/// End of input ends decoding without an implicit flush, so a frame's
/// closing boundary run stays in the output (it is the end mark) while
/// the trailer behind it does not.
pub fn destuff<I: IntoIterator<Item = u8>>(bits: I) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    let mut state = Framing::OutOfFrame;
    let mut ones = 0usize;
    for bit in bits {
        if bit > 0 {
            ones += 1;
            if state == Framing::InFrame {
                out.push(1);
            }
            continue;
        }
        match ones {
            0..=4 => {
                if state == Framing::InFrame {
                    out.push(0);
                }
            }
            5 => {} // the stuffed zero
            6 => {
                state = match state {
                    Framing::OutOfFrame => Framing::InFrame,
                    Framing::InFrame => Framing::OutOfFrame,
                };
            }
            n => return Err(DecodeError::MalformedStuffing(n)),
        }
        ones = 0;
    }
    Ok(out)
}

/// Reverse the bit order within each successive 8-bit group, padding
/// the final group with zeros.
pub fn reverse_byte_bits(bits: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bits.len().next_multiple_of(8));
    for chunk in bits.chunks(8) {
        let mut group = [0u8; 8];
        group[..chunk.len()].copy_from_slice(chunk);
        out.extend(group.iter().rev());
    }
    out
}

fn pack_nibbles(bits: &[u8]) -> Vec<u8> {
    bits.chunks_exact(4)
        .map(|c| c[0] << 3 | c[1] << 2 | c[2] << 1 | c[3])
        .collect()
}

/// One step of the CRC-CCITT (Kermit-style) checksum.
#[must_use]
pub fn crc_ccitt_update(crc: u16, data: u8) -> u16 {
    let mut d = data ^ (crc & 0xff) as u8;
    d ^= d << 4;
    (u16::from(d) << 8 | crc >> 8) ^ u16::from(d >> 4) ^ (u16::from(d) << 3)
}

/// A CRC-validated 84-nibble frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    nibbles: Vec<u8>,
}

impl Frame {
    /// Decode a frame from clock-recovered bytes.
    ///
    /// The input is whatever came out of a `data` line: typically 43
    /// bytes, but no particular count is assumed — the length check
    /// happens after destuffing, at the 84-nibble checkpoint.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut descrambler = Descrambler::new(TAPS);
        let destuffed = destuff(unpack_bits(bytes).map(|b| descrambler.next(b ^ 1) ^ 1))?;
        Self::from_nibbles(pack_nibbles(&reverse_byte_bits(&destuffed)))
    }

    /// Validate length and CRC of an already-destuffed nibble vector.
    pub fn from_nibbles(nibbles: Vec<u8>) -> Result<Self, DecodeError> {
        if nibbles.len() != FRAME_NIBBLES {
            return Err(DecodeError::WrongLength(nibbles.len()));
        }
        let crc = nibbles[..82]
            .iter()
            .tuples()
            .fold(CRC_INIT, |crc, (&hi, &lo)| {
                crc_ccitt_update(crc, hi << 4 | lo)
            });
        if crc != CRC_GOOD {
            return Err(DecodeError::CrcMismatch(crc));
        }
        Ok(Self { nibbles })
    }

    /// The raw nibbles, start mark first.
    #[must_use]
    pub fn nibbles(&self) -> &[u8] {
        &self.nibbles
    }

    /// Read a nibble range as a big-endian unsigned integer.
    ///
    /// Panics if the range reaches past the 84th nibble.
    #[must_use]
    pub fn uint(&self, range: std::ops::Range<usize>) -> u64 {
        self.nibbles[range]
            .iter()
            .fold(0, |acc, &n| acc << 4 | u64::from(n))
    }

    /// The end mark (nibbles 82..84). Not covered by the CRC, and not
    /// validated: it is the frame's closing boundary run, normally
    /// 0x7E.
    #[must_use]
    pub fn end_mark(&self) -> u8 {
        self.uint(82..84) as u8
    }
}
