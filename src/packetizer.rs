/*! Packet delimiting on the hard-sliced bit stream.

The transmitter is silent between packets, so the sliced stream sits
on one level for a long time, then toggles rapidly for the duration of
one packet, then goes quiet again. This block watches run lengths:
any transition opens a candidate packet, and a run longer than
[`MIN_BREAK`] samples closes it.

Most candidates are spurious — a noise spike is a transition too — so
everything emitted here is only a *candidate*. Sorting the wheat from
the chaff is the job of [clock recovery](crate::clock_recovery).
*/
use log::debug;

use crate::Result;
use crate::block::{Block, BlockRet};
use crate::stream::{Streamp, new_streamp};

/// Number of transition-free samples that ends a packet.
///
/// Must be large enough that no intra-packet run can trigger a split,
/// and small enough that inter-packet idle always does. At ~2.5 kbaud
/// and the deployed sample rates, real runs stay well under 100
/// samples.
pub const MIN_BREAK: usize = 100;

/// A candidate packet: a contiguous bit run delimited by idle periods,
/// prior to clock recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Raw hard-sliced bits, one sample each. Starts at a transition
    /// and ends just before the idle tail.
    pub bits: Vec<u8>,

    /// Number of level transitions observed while collecting, used as
    /// a cheap reject before the pulse statistics run.
    pub transitions: usize,
}

/// Packetizer block. Converts the endless bit stream into a finite
/// sequence of candidate packets.
pub struct Packetizer {
    src: Streamp<u8>,
    dst: Streamp<Candidate>,

    /// Last bit seen.
    pv: u8,
    /// Consecutive samples equal to `pv`.
    breaklen: usize,
    /// Transitions in the current candidate.
    ntran: usize,
    buf: Vec<u8>,
    in_packet: bool,
}

impl Packetizer {
    /// Create new packetizer.
    #[must_use]
    pub fn new(src: Streamp<u8>) -> Self {
        Self {
            src,
            dst: new_streamp(),
            pv: 0,
            breaklen: 0,
            ntran: 0,
            buf: Vec::new(),
            in_packet: false,
        }
    }

    /// Return the output stream of candidate packets.
    #[must_use]
    pub fn out(&self) -> Streamp<Candidate> {
        self.dst.clone()
    }

    fn process_one(&mut self, v: u8) -> Option<Candidate> {
        if v != self.pv {
            self.pv = v;
            self.in_packet = true;
            self.ntran += 1;
            self.breaklen = 0;
        } else {
            self.breaklen += 1;
        }
        if !self.in_packet {
            return None;
        }
        self.buf.push(v);
        if self.breaklen <= MIN_BREAK {
            return None;
        }
        // Idle tail: trim the break run, and one more sample to drop
        // the final pre-idle symbol.
        self.buf.truncate(self.buf.len() - self.breaklen);
        self.buf.pop();
        self.in_packet = false;
        let ntran = std::mem::take(&mut self.ntran);
        if self.buf.is_empty() {
            return None;
        }
        let cand = Candidate {
            bits: std::mem::take(&mut self.buf),
            transitions: ntran,
        };
        debug!(
            "Packetizer: candidate of {} samples, {} transitions",
            cand.bits.len(),
            cand.transitions
        );
        Some(cand)
    }
}

impl Block for Packetizer {
    fn block_name(&self) -> &'static str {
        "Packetizer"
    }
    fn work(&mut self) -> Result<BlockRet> {
        let bits: Vec<u8> = {
            let mut input = self.src.lock()?;
            if input.is_empty() {
                return Ok(BlockRet::Noop);
            }
            let bits = input.iter().copied().collect();
            input.clear();
            bits
        };
        for v in bits {
            if let Some(cand) = self.process_one(v) {
                self.dst.lock()?.push(cand);
            }
        }
        Ok(BlockRet::Ok)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::stream::new_streamp;

    fn run(bits: &[u8]) -> Result<Vec<Candidate>> {
        let s = new_streamp();
        s.lock()?.push_slice(bits);
        let mut p = Packetizer::new(s);
        let o = p.out();
        p.work()?;
        let got = o.lock()?.iter().cloned().collect();
        Ok(got)
    }

    #[test]
    fn single_burst() -> Result<()> {
        let mut bits = vec![0u8; 50];
        let burst: Vec<u8> = [1, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1]
            .iter()
            .flat_map(|&b| std::iter::repeat_n(b, 4))
            .collect();
        bits.extend(&burst);
        bits.extend(vec![0u8; 150]);
        let got = run(&bits)?;
        assert_eq!(got.len(), 1);
        // The burst ends on a transition into idle, so the trim eats
        // exactly the break run plus that first idle sample.
        assert_eq!(got[0].bits, burst);
        // One transition into the burst, four inside it, one out.
        assert_eq!(got[0].transitions, 6);
        Ok(())
    }

    #[test]
    fn two_bursts() -> Result<()> {
        let mut bits = vec![0u8; 10];
        let burst: Vec<u8> = [1, 0, 1, 0, 1]
            .iter()
            .flat_map(|&b| std::iter::repeat_n(b, 5))
            .collect();
        bits.extend(&burst);
        bits.extend(vec![0u8; 150]);
        bits.extend(&burst);
        bits.extend(vec![0u8; 150]);
        let got = run(&bits)?;
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], got[1]);
        Ok(())
    }

    #[test]
    fn short_runs_do_not_split() -> Result<()> {
        // A run of exactly MIN_BREAK samples inside a burst must not
        // end the packet.
        let mut bits = vec![0u8; 10];
        bits.extend([1u8; 5]);
        bits.extend(vec![0u8; MIN_BREAK]);
        bits.extend([1u8; 5]);
        bits.extend(vec![0u8; 150]);
        let got = run(&bits)?;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].bits.len(), 5 + MIN_BREAK + 5);
        Ok(())
    }

    #[test]
    fn lone_glitch_is_dropped() -> Result<()> {
        // A single transition followed by idle trims down to nothing.
        let mut bits = vec![0u8; 10];
        bits.push(1);
        bits.extend(vec![1u8; 150]);
        let got = run(&bits)?;
        assert!(got.is_empty(), "got: {got:?}");
        Ok(())
    }

    #[test]
    fn state_survives_chunk_boundaries() -> Result<()> {
        let s = new_streamp();
        let mut p = Packetizer::new(s.clone());
        let o = p.out();
        let burst: Vec<u8> = [1, 0, 1, 0, 1]
            .iter()
            .flat_map(|&b| std::iter::repeat_n(b, 5))
            .collect();
        let mut bits = vec![0u8; 10];
        bits.extend(&burst);
        bits.extend(vec![0u8; 150]);
        for chunk in bits.chunks(7) {
            s.lock()?.push_slice(chunk);
            p.work()?;
        }
        let got: Vec<Candidate> = o.lock()?.iter().cloned().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].bits, burst);
        Ok(())
    }
}
