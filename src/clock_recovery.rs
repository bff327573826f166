/*! Whole-packet clock recovery.

Instead of a PLL with timing error detectors and loop filters, this
takes each candidate packet as a whole and recovers the symbol clock
from its run-length statistics: the shortest pulse in the packet is a
first estimate of the symbol period, every longer pulse refines it,
and a final pass rounds each run to a whole number of symbols.

Candidates that do not look like packets — too short, pulses shorter
than two samples, run lengths that are no clean multiple of the
estimate — are quietly dropped. The hard-sliced stream is noisy and
most candidates are spurious transitions, not malformed frames, so
rejection here is a `debug!` log line, never an error.

On success, one line of the form `data xx xx …` is emitted downstream,
the recovered bit stream packed MSB-first into lowercase hex bytes.
*/
use std::fmt::Write;

use log::debug;

use crate::block::{Block, BlockRet};
use crate::packetizer::Candidate;
use crate::stream::{Streamp, new_streamp};
use crate::{Float, Result};

/// Candidates with fewer samples than this after edge trimming cannot
/// hold a frame.
pub const MIN_CANDIDATE: usize = 50;

/// Candidates with fewer transitions than this are rejected before
/// any pulse statistics run. Real frames have hundreds.
pub const MIN_TRANSITIONS: usize = 8;

/// Shortest believable pulse, in samples.
pub const MIN_PULSE: usize = 2;

/// Longest believable run of identical symbols.
pub const MAX_RUN: u32 = 20;

/// Highest tolerated relative error between a pulse length and a
/// whole multiple of the period estimate.
pub const MAX_PULSE_ERROR: Float = 0.4;

// Number of edge bits inspected by the grass trim.
const EDGE_BITS: usize = 4;

/// Remove up to four anomalous bits ("grass") from each end of a
/// candidate, so that edge artefacts do not pollute the pulse-length
/// statistics.
fn trim(data: &[u8]) -> &[u8] {
    if data.len() < 10 {
        return &[];
    }
    let start = if data[..EDGE_BITS].iter().all(|&b| b == data[0]) {
        0
    } else {
        // Scan inward until the symbol stabilises.
        let mut start = EDGE_BITS;
        for i in [3, 2, 1] {
            if data[start] == data[i] {
                start = i;
            } else {
                break;
            }
        }
        start
    };
    let last = data.len() - 1;
    let end = if data[data.len() - EDGE_BITS..]
        .iter()
        .all(|&b| b == data[last])
    {
        0
    } else {
        let mut end = EDGE_BITS;
        for i in [3, 2, 1] {
            if data[data.len() - end] == data[data.len() - i] {
                end = i;
            } else {
                break;
            }
        }
        end
    };
    &data[start..data.len() - end]
}

/// Measure the pulses of a candidate: (length in samples, symbol).
///
/// Runs are delimited by transitions. The tail run is truncated by the
/// packetizer's idle trim and carries no usable length, so it is left
/// out entirely.
fn pulses(data: &[u8]) -> Vec<(usize, u8)> {
    let mut out = Vec::new();
    let mut prev = data[0];
    let mut start = 0;
    for (i, &v) in data.iter().enumerate() {
        if v != prev {
            out.push((i - start, prev));
            prev = v;
            start = i;
        }
    }
    out
}

/// Recover the bit sequence of one candidate, or `None` if it does
/// not look like a packet.
fn recover(data: &[u8]) -> Option<Vec<u8>> {
    let data = trim(data);
    if data.len() < MIN_CANDIDATE {
        debug!("ClockRecovery: candidate too short: {} samples", data.len());
        return None;
    }
    let pulses = pulses(data);

    // First pass: the shortest pulse is the initial period estimate,
    // and anything below MIN_PULSE is noise.
    let mut shortest = usize::MAX;
    for &(pl, _) in &pulses {
        if pl < MIN_PULSE {
            debug!("ClockRecovery: pulse too short: {pl}");
            return None;
        }
        shortest = shortest.min(pl);
    }
    if pulses.is_empty() {
        return None;
    }

    // Second pass: refine. The 2:1 weighting biases toward the
    // established estimate while still tracking drift.
    let mut cp = shortest as Float;
    for &(pl, _) in &pulses {
        let pl = pl as Float;
        if pl < cp {
            cp = (cp * 2.0 + pl) / 3.0;
        } else if pl > cp {
            let r = pl / cp;
            let n = r.round();
            let e = ((r - n) / n).abs();
            if e > MAX_PULSE_ERROR {
                debug!("ClockRecovery: inconsistent pulse length: {pl} vs cp {cp}");
                return None;
            }
            if n > MAX_RUN as Float {
                debug!("ClockRecovery: too many consecutive identical bits: {n}");
                return None;
            }
            cp = (cp * 2.0 + pl / n) / 3.0;
        }
    }
    debug!("ClockRecovery: symbol period {cp} samples");

    // Third pass: emit one bit per symbol period.
    let mut bits = Vec::with_capacity(data.len() / shortest + 1);
    for &(pl, v) in &pulses {
        let n = (pl as Float / cp).round() as usize;
        bits.extend(std::iter::repeat_n(v, n));
    }
    Some(bits)
}

/// Format a recovered bit stream as a `data xx xx …` line.
///
/// The bits are read as one big integer, first bit most significant,
/// and printed as lowercase hex bytes: leading zero bits disappear,
/// and the digit string is padded on the left to whole bytes.
fn hex_line(bits: &[u8]) -> String {
    let bits = match bits.iter().position(|&b| b != 0) {
        Some(n) => &bits[n..],
        None => &[],
    };
    let mut line = String::from("data");
    if bits.is_empty() {
        line.push_str(" 00");
        return line;
    }
    let mut acc = 0u8;
    let mut nbits = (8 - bits.len() % 8) % 8;
    for &b in bits {
        acc = acc << 1 | b;
        nbits += 1;
        if nbits == 8 {
            write!(line, " {acc:02x}").expect("write to String failed");
            acc = 0;
            nbits = 0;
        }
    }
    line
}

/// Whole-packet clock recovery block.
///
/// Takes candidate packets, emits `data` hex lines for the ones whose
/// symbol clock could be recovered.
pub struct ClockRecovery {
    src: Streamp<Candidate>,
    dst: Streamp<String>,
}

impl ClockRecovery {
    /// Create new clock recovery block.
    #[must_use]
    pub fn new(src: Streamp<Candidate>) -> Self {
        Self {
            src,
            dst: new_streamp(),
        }
    }

    /// Return the output stream of hex lines.
    #[must_use]
    pub fn out(&self) -> Streamp<String> {
        self.dst.clone()
    }

    fn process_one(&self, cand: &Candidate) -> Option<String> {
        if cand.transitions < MIN_TRANSITIONS {
            debug!(
                "ClockRecovery: only {} transitions, rejecting",
                cand.transitions
            );
            return None;
        }
        recover(&cand.bits).map(|bits| hex_line(&bits))
    }
}

impl Block for ClockRecovery {
    fn block_name(&self) -> &'static str {
        "ClockRecovery"
    }
    fn work(&mut self) -> Result<BlockRet> {
        let mut busy = false;
        loop {
            let cand = match self.src.lock()?.pop() {
                None => return Ok(if busy { BlockRet::Ok } else { BlockRet::Noop }),
                Some(c) => c,
            };
            busy = true;
            if let Some(line) = self.process_one(&cand) {
                self.dst.lock()?.push(line);
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn expand(symbols: &[u8], sps: usize) -> Vec<u8> {
        symbols
            .iter()
            .flat_map(|&b| std::iter::repeat_n(b, sps))
            .collect()
    }

    #[test]
    fn trim_uniform_edges() {
        let d = expand(&[1, 0, 1], 5);
        assert_eq!(trim(&d), &d[..]);
    }

    #[test]
    fn trim_grass() {
        // Leading grass bit, tail stabilises two in.
        let d = [0, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1];
        assert_eq!(trim(&d), &[1, 1, 1, 1, 0, 0, 0]);
        let d = [1, 1, 1, 1, 0, 0, 0, 0, 1, 0, 1, 0];
        assert_eq!(trim(&d), &[1, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn trim_short_input() {
        assert_eq!(trim(&[1, 0, 1, 0, 1, 0, 1, 0, 1]), &[] as &[u8]);
    }

    #[test]
    fn recover_clean() {
        let d = expand(&[1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1], 5);
        // The tail run is not decodable and is left out.
        assert_eq!(
            recover(&d).unwrap(),
            vec![1, 0, 1, 1, 0, 1, 0, 0, 1, 0]
        );
    }

    #[test]
    fn recover_jitter() {
        // Symbols at 4.7 samples per symbol, rounded per edge.
        let symbols = [1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1];
        let mut d = Vec::new();
        let mut pos: Float = 0.0;
        for &b in &symbols {
            pos += 4.7;
            let n = pos.round() as usize - d.len();
            d.extend(std::iter::repeat_n(b, n));
        }
        assert_eq!(recover(&d).unwrap(), symbols[..symbols.len() - 1]);
    }

    #[test]
    fn reject_short_candidate() {
        // 40 samples is below the minimum candidate size.
        let d = expand(&[1, 0, 1, 0, 1, 0, 1, 0], 5);
        assert_eq!(d.len(), 40);
        assert_eq!(recover(&d), None);
    }

    #[test]
    fn reject_short_pulse() {
        let mut d = Vec::new();
        for _ in 0..3 {
            d.extend(expand(&[1, 0], 5));
            d.push(1);
            d.extend([0; 5]);
            d.extend([1; 5]);
        }
        assert_eq!(recover(&d), None);
    }

    #[test]
    fn reject_inconsistent_pulse() {
        // 29 samples at a period of 20 is 1.45 periods: 45% off a
        // whole multiple.
        let mut d = vec![1; 20];
        d.extend([0; 20]);
        d.extend([1; 29]);
        d.extend([0; 20]);
        assert_eq!(recover(&d), None);
    }

    #[test]
    fn reject_too_long_run() {
        let mut d = vec![1; 5];
        d.extend([0; 5]);
        d.extend([1; 110]);
        d.extend([0; 5]);
        assert_eq!(recover(&d), None);
    }

    #[test]
    fn reject_few_transitions() {
        let b = ClockRecovery::new(new_streamp());
        let bits = expand(&[1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1], 5);
        let cand = Candidate {
            bits: bits.clone(),
            transitions: 3,
        };
        assert_eq!(b.process_one(&cand), None);
        let cand = Candidate {
            bits,
            transitions: 9,
        };
        assert!(b.process_one(&cand).is_some());
    }

    #[test]
    fn hex_line_format() {
        assert_eq!(
            hex_line(&[1, 0, 1, 1, 0, 1, 0, 0, 1, 0]),
            "data 02 d2"
        );
        // Leading zero bits do not survive the integer rendering.
        assert_eq!(hex_line(&[0, 0, 1, 1, 0, 1, 0, 0, 1, 0]), "data d2");
        assert_eq!(hex_line(&[0, 0, 0]), "data 00");
        assert_eq!(
            hex_line(&[1, 1, 0, 0, 1, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1]),
            "data ca ff"
        );
    }
}
