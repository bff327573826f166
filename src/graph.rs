/*! Graphs contain blocks connected by streams, and run them.

# Example

```
use ec3k::graph::Graph;
use ec3k::blocks::{VectorSource, BinarySlicer};

let src = VectorSource::new(vec![0u8, 255, 255, 0]);
let slicer = BinarySlicer::new(src.out());
let bits = slicer.out();
let mut g = Graph::new();
g.add(Box::new(src));
g.add(Box::new(slicer));
g.run()?;
assert_eq!(bits.lock().unwrap().iter().copied().collect::<Vec<_>>(),
           vec![0, 1, 1, 0]);
# Ok::<(), ec3k::Error>(())
```
*/
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::debug;

use crate::Result;
use crate::block::{Block, BlockRet};

/// Handle used to ask a running graph to stop.
///
/// The stop is cooperative: the current scheduler pass finishes, and
/// any in-progress candidate packet is discarded with the rest of the
/// pipeline state.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    /// Ask the graph to stop.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// A graph is a set of blocks, run round-robin until no block has
/// anything left to do.
pub struct Graph {
    blocks: Vec<Box<dyn Block>>,
    cancel: CancelToken,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            cancel: CancelToken {
                inner: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Add a block to the graph.
    pub fn add(&mut self, b: Box<dyn Block>) {
        self.blocks.push(b);
    }

    /// Return a token that can stop the graph from another thread,
    /// e.g. a Ctrl-C handler.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the graph until there is no more data to process, or until
    /// cancelled.
    pub fn run(&mut self) -> Result<()> {
        let mut eof = vec![false; self.blocks.len()];
        loop {
            if self.cancel.is_canceled() {
                debug!("graph: cancelled");
                return Ok(());
            }
            let st_pass = Instant::now();
            let mut did_work = false;
            let mut pending = false;
            for (n, b) in self.blocks.iter_mut().enumerate() {
                if eof[n] {
                    continue;
                }
                let st = Instant::now();
                let ret = b.work()?;
                debug!(
                    "graph: work() on {} returned {:?}, took {:?}",
                    b.block_name(),
                    ret,
                    st.elapsed()
                );
                match ret {
                    BlockRet::Ok => did_work = true,
                    BlockRet::Pending => pending = true,
                    BlockRet::Noop => {}
                    BlockRet::EOF => eof[n] = true,
                }
            }
            debug!("graph: pass took {:?}", st_pass.elapsed());
            if !did_work {
                if !pending {
                    return Ok(());
                }
                // A background producer may deliver any moment.
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
