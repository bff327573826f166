/*! Frame decoder block: hex lines in, telemetry records out.

The wire format between clock recovery and this block is UTF-8 text:
one `data xx xx …` line per recovered packet. Unrecognised lines are
ignored, so the block can also be fed the raw output of an external
capture process.

Decode failures are counted and logged, never propagated: the caller
of [`work`](crate::block::Block::work) only sees records that passed
every check. For decoding outside a graph, use
[`Frame::decode`](crate::frame::Frame::decode) and
[`TelemetryRecord::from_frame`] directly.
*/
use log::{debug, info};

use crate::Result;
use crate::block::{Block, BlockRet};
use crate::frame::Frame;
use crate::stream::{Streamp, new_streamp};
use crate::telemetry::TelemetryRecord;

/// Parse one line of the intermediate wire format.
///
/// Returns the hex bytes of a `data` line, or `None` for anything
/// else (wrong marker word, odd digits, non-hex tokens).
#[must_use]
pub fn parse_line(line: &str) -> Option<Vec<u8>> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "data" {
        return None;
    }
    let digits: String = tokens.collect();
    hex::decode(&digits).ok()
}

/// Frame decoder block.
///
/// This block takes `data` hex lines and outputs the telemetry
/// records of the frames that decode cleanly.
pub struct FrameDecoder {
    src: Streamp<String>,
    dst: Streamp<TelemetryRecord>,
    id_filter: Option<u16>,
    decoded: usize,
    invalid: usize,
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        info!(
            "EC3K frame decoder: decoded {}, invalid {}",
            self.decoded, self.invalid
        );
    }
}

impl FrameDecoder {
    /// Create new frame decoder.
    #[must_use]
    pub fn new(src: Streamp<String>) -> Self {
        Self {
            src,
            dst: new_streamp(),
            id_filter: None,
            decoded: 0,
            invalid: 0,
        }
    }

    /// Only deliver records from one transmitter.
    pub fn set_id_filter(&mut self, id: u16) {
        self.id_filter = Some(id);
    }

    /// Return the output stream of telemetry records.
    #[must_use]
    pub fn out(&self) -> Streamp<TelemetryRecord> {
        self.dst.clone()
    }

    /// Number of frames decoded so far.
    #[must_use]
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Number of frames rejected so far.
    #[must_use]
    pub fn invalid(&self) -> usize {
        self.invalid
    }

    fn process_one(&mut self, line: &str) -> Option<TelemetryRecord> {
        let bytes = parse_line(line)?;
        debug!("FrameDecoder: decoding {} bytes", bytes.len());
        let record = Frame::decode(&bytes).and_then(|f| TelemetryRecord::from_frame(&f));
        match record {
            Ok(record) => {
                self.decoded += 1;
                if let Some(id) = self.id_filter
                    && record.id != id
                {
                    debug!("FrameDecoder: dropping record from {:04x}", record.id);
                    return None;
                }
                Some(record)
            }
            Err(e) => {
                self.invalid += 1;
                debug!("FrameDecoder: invalid packet: {e}");
                None
            }
        }
    }
}

impl Block for FrameDecoder {
    fn block_name(&self) -> &'static str {
        "FrameDecoder"
    }
    fn work(&mut self) -> Result<BlockRet> {
        let mut busy = false;
        loop {
            let line = match self.src.lock()?.pop() {
                None => return Ok(if busy { BlockRet::Ok } else { BlockRet::Noop }),
                Some(line) => line,
            };
            busy = true;
            if let Some(record) = self.process_one(&line) {
                self.dst.lock()?.push(record);
            }
        }
    }
}
