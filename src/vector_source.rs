//! Generate values from a fixed vector.
use crate::Result;
use crate::block::{Block, BlockRet};
use crate::stream::{Streamp, new_streamp};

/// Generate values from a fixed vector.
///
/// Mostly useful for tests and for replaying short captures.
pub struct VectorSource<T> {
    dst: Streamp<T>,
    data: Option<Vec<T>>,
}

impl<T> VectorSource<T> {
    /// Create new vector source block.
    #[must_use]
    pub fn new(data: Vec<T>) -> Self {
        Self {
            dst: new_streamp(),
            data: Some(data),
        }
    }

    /// Return the output stream.
    #[must_use]
    pub fn out(&self) -> Streamp<T> {
        self.dst.clone()
    }
}

impl<T> Block for VectorSource<T> {
    fn block_name(&self) -> &'static str {
        "VectorSource"
    }
    fn work(&mut self) -> Result<BlockRet> {
        match self.data.take() {
            None => Ok(BlockRet::EOF),
            Some(data) => {
                let mut o = self.dst.lock()?;
                for v in data {
                    o.push(v);
                }
                Ok(BlockRet::Ok)
            }
        }
    }
}
