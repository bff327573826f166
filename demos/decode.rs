/*! EnergyCount 3000 receiver, minus the radio.

Reads a hard-sliced sample stream (one byte per sample) from a file or
stdin, runs the whole receive pipeline, and prints one report per
decoded packet:

```no_run
$ ./decode -r capture.u8
$ ./decode -r capture.u8 --json
$ ./capture -r capture.u8 | ./decode --lines --id f100
```

With `--lines` the input is the text output of the `capture` demo
instead of raw samples.
*/
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ec3k::block::{Block, BlockRet};
use ec3k::blocks::*;
use ec3k::graph::Graph;
use ec3k::stream::{Streamp, new_streamp};
use ec3k::{Error, TelemetryRecord};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    #[arg(short = 'r', help = "Read from file instead of stdin")]
    read: Option<PathBuf>,

    #[arg(long, help = "Input is capture text lines, not raw samples")]
    lines: bool,

    #[arg(long, help = "Print records as JSON lines")]
    json: bool,

    #[arg(long, value_parser = parse_id, help = "Only show this transmitter (hex id)")]
    id: Option<u16>,

    #[arg(short = 'v', default_value = "0")]
    verbose: usize,
}

fn parse_id(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

/// Feed text lines from a reader into the graph.
struct LineSource {
    lines: std::io::Lines<Box<dyn BufRead + Send>>,
    dst: Streamp<String>,
}

impl LineSource {
    fn new(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            lines: reader.lines(),
            dst: new_streamp(),
        }
    }
    fn out(&self) -> Streamp<String> {
        self.dst.clone()
    }
}

impl Block for LineSource {
    fn block_name(&self) -> &'static str {
        "LineSource"
    }
    fn work(&mut self) -> Result<BlockRet, Error> {
        match self.lines.next() {
            None => Ok(BlockRet::EOF),
            Some(line) => {
                self.dst.lock()?.push(line?);
                Ok(BlockRet::Ok)
            }
        }
    }
}

/// Print records as they arrive.
struct RecordSink {
    src: Streamp<TelemetryRecord>,
    json: bool,
}

impl Block for RecordSink {
    fn block_name(&self) -> &'static str {
        "RecordSink"
    }
    fn work(&mut self) -> Result<BlockRet, Error> {
        let mut input = self.src.lock()?;
        if input.is_empty() {
            return Ok(BlockRet::Noop);
        }
        for record in input.iter() {
            if self.json {
                println!(
                    "{}",
                    serde_json::to_string(record).expect("record serializes")
                );
            } else {
                println!("{record}\n");
            }
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

    let prev: Streamp<String> = if opt.lines {
        let reader: Box<dyn BufRead + Send> = match &opt.read {
            Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
            None => Box::new(std::io::BufReader::new(std::io::stdin())),
        };
        let src = LineSource::new(reader);
        let prev = src.out();
        g.add(Box::new(src));
        prev
    } else {
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
        prev
    };

    let mut decoder = FrameDecoder::new(prev);
    if let Some(id) = opt.id {
        decoder.set_id_filter(id);
    }
    let prev = decoder.out();
    g.add(Box::new(decoder));

    g.add(Box::new(RecordSink {
        src: prev,
        json: opt.json,
    }));

    let cancel = g.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("Received Ctrl+C!");
        cancel.cancel();
    })
    .expect("Error setting Ctrl-C handler");

    g.run()?;
    Ok(())
}
