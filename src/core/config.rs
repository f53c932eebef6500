use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::compression::compress::CompressionType;

/// Environment variable overriding the segment root directory
pub const SEGMENT_DIR_ENV: &str = "OLAPDEX_SEGMENT_DIR";

/// Options applied when a segment is persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub compression: CompressionType,
}

impl Default for IndexSpec {
    fn default() -> Self {
        IndexSpec {
            compression: CompressionType::LZ4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub segment_dir: PathBuf,
    pub max_rows: usize,                 // Incremental index capacity
    pub build_threads: usize,            // Rayon pool used by SegmentBuilder
    pub index_spec: IndexSpec,
    pub max_intermediate_rows: usize,    // Group-by key limit per query
    pub search_limit: usize,             // Default search hit limit
}

impl Default for Config {
    fn default() -> Self {
        Config {
            segment_dir: std::env::temp_dir().join("olapdex-segments"),
            max_rows: usize::MAX,
            build_threads: num_cpus::get(),
            index_spec: IndexSpec::default(),
            max_intermediate_rows: 10_000,
            search_limit: 1000,
        }
    }
}

impl Config {
    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(dir) = std::env::var_os(SEGMENT_DIR_ENV) {
            if !dir.is_empty() {
                config.segment_dir = PathBuf::from(dir);
            }
        }
        config
    }

    pub fn with_segment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.segment_dir = dir.into();
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.index_spec.compression = compression;
        self
    }
}
