pub mod error;
pub mod config;
pub mod types;
pub mod observer;
pub mod database;

pub use config::{Config, IndexSpec};
pub use database::{EmbeddedOlap, IngestReport};
pub use error::{Error, ErrorKind, Result};
pub use types::{FieldValue, Interval, Record, Timestamp};
