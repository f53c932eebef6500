pub mod row_source;
pub mod delimited;

pub use delimited::DelimitedRowSource;
pub use row_source::{RowSource, RowSourceIter, VecRowSource};
