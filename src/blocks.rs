//! Convenient mod collecting all blocks for import.
pub use crate::binary_slicer::BinarySlicer;
pub use crate::clock_recovery::ClockRecovery;
pub use crate::deframer::FrameDecoder;
pub use crate::packetizer::{Candidate, Packetizer};
pub use crate::reader_source::ReaderSource;
pub use crate::vector_source::VectorSource;
