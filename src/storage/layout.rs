use std::path::{Component, Path, PathBuf};
use std::fs;
use crate::core::error::{Error, ErrorKind, Result};

/// Directory structure of a segment root
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub segments_dir: PathBuf,  // Persisted segments (.seg files)
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let segments_dir = base_dir.join("segments");
        fs::create_dir_all(&segments_dir)?;

        Ok(StorageLayout {
            base_dir,
            segments_dir,
        })
    }

    /// File holding the segment stored under `location`. Locations are
    /// relative, slash-separated names and may not leave the root.
    pub fn segment_path(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let valid = !location.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("Invalid segment location '{}'", location),
            ));
        }
        Ok(self.segments_dir.join(format!("{}.seg", location)))
    }
}
