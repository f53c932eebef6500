pub mod dictionary;
pub mod incremental;

pub use dictionary::{DimensionDictionary, SortedDictionary};
pub use incremental::{IncrementalIndex, SealedIndex};
