/*! Block trait and return values.

Blocks are the processing units of the receiver. Each block does one
thing, and blocks are connected with streams into a
[graph](crate::graph).
*/
use crate::Result;

/** Return type for all blocks.

This lets the scheduler know whether the block did anything, and
whether it could ever do anything again.
*/
#[derive(Debug, Clone)]
pub enum BlockRet {
    /// At least one sample or PDU was consumed or produced.
    Ok,

    /// Nothing was done this time, but a background activity (e.g. a
    /// reader thread) may suddenly provide more.
    Pending,

    /// Nothing was done, because there was not enough input.
    ///
    /// When a full scheduler pass produces only `Noop` and `EOF`, the
    /// graph is considered done.
    Noop,

    /// The block will never produce anything again.
    ///
    /// E.g. a file source that reached end of file.
    EOF,
}

/// Block trait, that must be implemented for all blocks.
pub trait Block {
    /// Name of the block.
    ///
    /// Not the name of the *instance* of the block.
    fn block_name(&self) -> &'static str;

    /// Do some work.
    ///
    /// A block keeps track of its own input and output streams.
    fn work(&mut self) -> Result<BlockRet>;
}
