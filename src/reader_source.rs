//! Stream sample bytes from any reader.
use std::io::Read;

use log::debug;

use crate::Result;
use crate::block::{Block, BlockRet};
use crate::stream::{Streamp, new_streamp};

// Matches the chunk size of the original capture pipe.
const BUFSIZE: usize = 4096;

fn reader_thread<R: Read + Send + 'static>(
    mut reader: R,
    tx: std::sync::mpsc::SyncSender<Result<Vec<u8>>>,
) {
    loop {
        let mut buf = vec![0; BUFSIZE];
        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) => match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                    continue;
                }
                _ => {
                    if let Err(e) = tx.send(Err(e.into())) {
                        debug!("ReaderSource thread failed to report read error: {e}");
                    }
                    return;
                }
            },
        };
        buf.truncate(n);
        if let Err(e) = tx.send(Ok(buf)) {
            debug!("ReaderSource thread failed to send data: {e}");
            return;
        }
        if n == 0 {
            // EOF.
            return;
        }
    }
}

/// Arbitrary reader source.
///
/// Reads sample bytes from anything implementing `io::Read` (a capture
/// file, a pipe from the demodulator, stdin) and feeds them into the
/// graph. Reading happens on a separate thread, so a slow producer
/// does not block the scheduler.
pub struct ReaderSource {
    dst: Streamp<u8>,
    rx: std::sync::mpsc::Receiver<Result<Vec<u8>>>,
}

impl ReaderSource {
    /// Create a new reader source.
    pub fn new<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let (tx, rx) = std::sync::mpsc::sync_channel(2);
        std::thread::Builder::new()
            .name("ReaderSourceReader".to_string())
            .spawn(move || reader_thread(reader, tx))?;
        Ok(Self {
            dst: new_streamp(),
            rx,
        })
    }

    /// Return the output stream.
    #[must_use]
    pub fn out(&self) -> Streamp<u8> {
        self.dst.clone()
    }
}

impl Block for ReaderSource {
    fn block_name(&self) -> &'static str {
        "ReaderSource"
    }
    fn work(&mut self) -> Result<BlockRet> {
        let mut produced = false;
        loop {
            let buf = match self.rx.try_recv() {
                Ok(buf) => buf?,
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    return Ok(BlockRet::EOF);
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => {
                    return Ok(if produced {
                        BlockRet::Ok
                    } else {
                        BlockRet::Pending
                    });
                }
            };
            if buf.is_empty() {
                debug!("ReaderSource: input closed");
                return Ok(BlockRet::EOF);
            }
            self.dst.lock()?.push_slice(&buf);
            produced = true;
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn reader_source() -> Result<()> {
        let data = b"hello world";
        let r = std::io::Cursor::new(data);
        let mut b = ReaderSource::new(r)?;
        let o = b.out();
        loop {
            if let BlockRet::EOF = b.work()? {
                break;
            }
        }
        assert_eq!(
            o.lock()?.iter().copied().collect::<Vec<_>>(),
            b"hello world"
        );
        Ok(())
    }
}
