pub mod vbyte;
pub mod delta;
pub mod compress;

pub use compress::{CompressedBlock, CompressionType};
