use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    Internal,
    InvalidState,
    Corrupted,
    /// Row source could not turn a raw line into a record (skipped, never fatal)
    MalformedRecord,
    /// Record does not fit the declared schema (fatal to that `add` only)
    SchemaMismatch,
    /// Row or grouping-key limit reached
    CapacityExceeded,
    /// Durable store failed while persisting a segment
    BuildFailed,
    UnsupportedQuery,
    /// Filter tree references something the segment does not have
    FilterEvaluation,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn schema_mismatch(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::SchemaMismatch, context.into())
    }

    pub fn unsupported_query(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnsupportedQuery, context.into())
    }

    pub fn filter_evaluation(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::FilterEvaluation, context.into())
    }

    pub fn corrupted(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Corrupted, context.into())
    }

    /// Wraps any persist-time failure so callers see a single build error.
    pub fn build_failed(cause: Error) -> Self {
        Error {
            kind: ErrorKind::BuildFailed,
            context: format!("{:?}: {}", cause.kind, cause.context),
        }
    }

    /// Ingest keeps going after per-record errors; only a full index stops the batch.
    pub fn is_fatal_to_batch(&self) -> bool {
        !matches!(self.kind, ErrorKind::MalformedRecord | ErrorKind::SchemaMismatch)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("JSON error: {}", err),
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("FST error: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidArgument,
            context: format!("Invalid regex: {}", err),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_record_errors_do_not_stop_a_batch() {
        assert!(!Error::schema_mismatch("bad metric").is_fatal_to_batch());
        assert!(!Error::new(ErrorKind::MalformedRecord, "short line".into()).is_fatal_to_batch());
        assert!(Error::new(ErrorKind::CapacityExceeded, "full".into()).is_fatal_to_batch());
    }

    #[test]
    fn build_failed_keeps_the_cause() {
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let err = Error::build_failed(io);
        assert_eq!(err.kind, ErrorKind::BuildFailed);
        assert!(err.context.contains("disk full"));
    }
}
