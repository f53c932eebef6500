use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use memmap2::Mmap;
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use crate::compression::compress::CompressionType;
use crate::core::config::{Config, IndexSpec};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::SegmentData;
use crate::storage::segment_reader::QueryableSegment;

/// Durable segment storage. `write` and `read` are all-or-nothing: a reader
/// either sees a complete segment or none at all.
pub trait SegmentStore: Send + Sync {
    /// Stores `data` under `location`, replacing any previous segment; returns bytes written
    fn write(&self, location: &str, data: &SegmentData) -> Result<u64>;

    /// Segment data plus its stored size in bytes
    fn read(&self, location: &str) -> Result<(SegmentData, u64)>;

    fn exists(&self, location: &str) -> bool;

    fn load(&self, location: &str) -> Result<QueryableSegment> {
        let (data, size) = self.read(location)?;
        let segment = QueryableSegment::from_data(data, size)?;
        info!(segment = %segment.id(), location, rows = segment.row_count(), bytes = size, "loaded segment");
        Ok(segment)
    }
}

/// One `.seg` file per location under the configured root
pub struct FileSegmentStore {
    pub layout: StorageLayout,
    pub index_spec: IndexSpec,
}

impl FileSegmentStore {
    pub fn new(layout: StorageLayout, index_spec: IndexSpec) -> Self {
        FileSegmentStore { layout, index_spec }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(StorageLayout::new(config.segment_dir.clone())?, config.index_spec))
    }
}

impl SegmentStore for FileSegmentStore {
    fn write(&self, location: &str, data: &SegmentData) -> Result<u64> {
        let path = self.layout.segment_path(location)?;
        let dir = path.parent().ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument, format!("No parent directory for '{}'", location))
        })?;
        fs::create_dir_all(dir)?;

        let bytes = data.encode(self.index_spec.compression)?;

        // Written next to the target, then renamed over it in one step
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;

        debug!(path = %path.display(), bytes = bytes.len(), "segment file committed");
        Ok(bytes.len() as u64)
    }

    fn read(&self, location: &str) -> Result<(SegmentData, u64)> {
        let path = self.layout.segment_path(location)?;
        if !path.exists() {
            return Err(Error::new(ErrorKind::NotFound, format!("No segment at '{}'", location)));
        }
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        if size == 0 {
            return Err(Error::corrupted(format!("Segment file for '{}' is empty", location)));
        }

        // SAFETY: segment files are only ever replaced by rename, never modified in place
        let mmap = unsafe { Mmap::map(&file)? };
        let data = SegmentData::decode(&mmap[..])?;
        Ok((data, size))
    }

    fn exists(&self, location: &str) -> bool {
        self.layout.segment_path(location).map(|p| p.is_file()).unwrap_or(false)
    }
}

/// In-process store holding encoded segment bytes
pub struct MemorySegmentStore {
    pub compression: CompressionType,
    segments: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        Self::with_compression(CompressionType::LZ4)
    }

    pub fn with_compression(compression: CompressionType) -> Self {
        MemorySegmentStore {
            compression,
            segments: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }
}

impl Default for MemorySegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentStore for MemorySegmentStore {
    fn write(&self, location: &str, data: &SegmentData) -> Result<u64> {
        let bytes = data.encode(self.compression)?;
        let len = bytes.len() as u64;
        self.segments.write().insert(location.to_string(), bytes);
        Ok(len)
    }

    fn read(&self, location: &str) -> Result<(SegmentData, u64)> {
        let segments = self.segments.read();
        let bytes = segments.get(location).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("No segment at '{}'", location))
        })?;
        Ok((SegmentData::decode(bytes)?, bytes.len() as u64))
    }

    fn exists(&self, location: &str) -> bool {
        self.segments.read().contains_key(location)
    }
}
