pub mod segment;
pub mod column;
pub mod layout;
pub mod store;
pub mod segment_writer;
pub mod segment_reader;

pub use segment_reader::QueryableSegment;
pub use segment_writer::SegmentBuilder;
pub use store::{FileSegmentStore, MemorySegmentStore, SegmentStore};
