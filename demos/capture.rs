/*! Packetize a hard-sliced sample stream into `data` hex lines.

Reads one byte per sample (as produced by an FM demodulator and
binary slicer, high ≥ 190) from a file or stdin, and prints one
`data xx xx …` line per recovered packet:

```no_run
$ ./capture -r capture.u8
$ some_demodulator | ./capture
```

The output can be piped into the `decode` demo with `--lines`.
*/
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ec3k::Error;
use ec3k::block::{Block, BlockRet};
use ec3k::blocks::*;
use ec3k::graph::Graph;
use ec3k::stream::Streamp;

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    #[arg(short = 'r', help = "Read samples from file instead of stdin")]
    read: Option<PathBuf>,

    #[arg(short = 'v', default_value = "0")]
    verbose: usize,
}

/// Print every line that comes down the stream.
struct LineSink {
    src: Streamp<String>,
}

impl Block for LineSink {
    fn block_name(&self) -> &'static str {
        "LineSink"
    }
    fn work(&mut self) -> Result<BlockRet, Error> {
        let mut input = self.src.lock()?;
        if input.is_empty() {
            return Ok(BlockRet::Noop);
        }
        for line in input.iter() {
            println!("{line}");
        }
        input.clear();
        Ok(BlockRet::Ok)
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("ec3k")
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let mut g = Graph::new();
    let src = match &opt.read {
        Some(path) => ReaderSource::new(std::fs::File::open(path)?)?,
        None => ReaderSource::new(std::io::stdin())?,
    };
    let prev = src.out();
    g.add(Box::new(src));

    let slicer = BinarySlicer::new(prev);
    let prev = slicer.out();
    g.add(Box::new(slicer));

    let packetizer = Packetizer::new(prev);
    let prev = packetizer.out();
    g.add(Box::new(packetizer));

    let clock = ClockRecovery::new(prev);
    let prev = clock.out();
    g.add(Box::new(clock));

    g.add(Box::new(LineSink { src: prev }));

    let cancel = g.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("Received Ctrl+C!");
        cancel.cancel();
    })
    .expect("Error setting Ctrl-C handler");

    g.run()?;
    Ok(())
}
