pub mod schema;

pub use schema::{DimensionsSpec, IndexSchema};
