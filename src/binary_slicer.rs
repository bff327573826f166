//! Turn demodulated sample bytes into binary `1u8` and `0u8`.
use crate::Result;
use crate::block::{Block, BlockRet};
use crate::stream::{Streamp, new_streamp};

/// Slicing threshold.
///
/// The upstream FM discriminator emits one byte per sample in the
/// range 0..255. This threshold is a property of that output range and
/// must not be changed without a coordinated upstream change.
pub const THRESHOLD: u8 = 190;

/// Turn sample bytes ≥ [`THRESHOLD`] into binary `1u8`, and the rest
/// into `0u8`.
pub struct BinarySlicer {
    src: Streamp<u8>,
    dst: Streamp<u8>,
}

impl BinarySlicer {
    /// Create new binary slicer.
    #[must_use]
    pub fn new(src: Streamp<u8>) -> Self {
        Self {
            src,
            dst: new_streamp(),
        }
    }

    /// Return the output stream.
    #[must_use]
    pub fn out(&self) -> Streamp<u8> {
        self.dst.clone()
    }

    fn process_one(&self, a: u8) -> u8 {
        if a >= THRESHOLD { 1 } else { 0 }
    }
}

impl Block for BinarySlicer {
    fn block_name(&self) -> &'static str {
        "BinarySlicer"
    }
    fn work(&mut self) -> Result<BlockRet> {
        let mut input = self.src.lock()?;
        if input.is_empty() {
            return Ok(BlockRet::Noop);
        }
        let mut o = self.dst.lock()?;
        for s in input.iter() {
            o.push(self.process_one(*s));
        }
        input.clear();
        Ok(BlockRet::Ok)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::stream::new_streamp;

    #[test]
    fn slice() -> Result<()> {
        let s = new_streamp();
        s.lock()?.push_slice(&[0u8, 189, 190, 255, 42]);
        let mut b = BinarySlicer::new(s);
        let o = b.out();
        b.work()?;
        assert_eq!(
            o.lock()?.iter().copied().collect::<Vec<_>>(),
            vec![0, 0, 1, 1, 0]
        );
        Ok(())
    }
}
