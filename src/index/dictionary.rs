use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use std::collections::HashMap;
use std::ops::Range;
use crate::core::error::{Error, ErrorKind, Result};

/// Ingest-time dictionary for one dimension: codes in first-seen order,
/// contiguous from 0, never removed.
#[derive(Debug, Clone, Default)]
pub struct DimensionDictionary {
    ids: HashMap<String, u32>,
    values: Vec<String>,    // code → value
}

impl DimensionDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing code for `value`, or the next free one
    pub fn encode(&mut self, value: &str) -> u32 {
        if let Some(&code) = self.ids.get(value) {
            return code;
        }
        let code = self.values.len() as u32;
        self.ids.insert(value.to_string(), code);
        self.values.push(value.to_string());
        code
    }

    /// Code lookup without allocating a new one
    pub fn lookup(&self, value: &str) -> Option<u32> {
        self.ids.get(value).copied()
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted dictionary plus `remap[old_code] == new_code`
    pub fn freeze(&self) -> Result<(SortedDictionary, Vec<u32>)> {
        let mut order: Vec<u32> = (0..self.values.len() as u32).collect();
        order.sort_by(|&a, &b| self.values[a as usize].cmp(&self.values[b as usize]));

        let mut remap = vec![0u32; self.values.len()];
        let mut sorted = Vec::with_capacity(self.values.len());
        for (new_code, &old_code) in order.iter().enumerate() {
            remap[old_code as usize] = new_code as u32;
            sorted.push(self.values[old_code as usize].clone());
        }

        Ok((SortedDictionary::from_sorted(sorted)?, remap))
    }
}

/// Frozen dictionary: values in lexicographic order, code == rank.
/// Backed by an FST for value → code and prefix lookups.
#[derive(Clone)]
pub struct SortedDictionary {
    values: Vec<String>,
    fst: Map<Vec<u8>>,
}

impl std::fmt::Debug for SortedDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedDictionary").field("values", &self.values).finish()
    }
}

impl PartialEq for SortedDictionary {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl SortedDictionary {
    /// Builds the FST; `values` must be strictly increasing
    pub fn from_sorted(values: Vec<String>) -> Result<Self> {
        let mut builder = MapBuilder::memory();
        for (code, value) in values.iter().enumerate() {
            builder.insert(value.as_bytes(), code as u64).map_err(|e| {
                Error::new(ErrorKind::Corrupted, format!("Dictionary is not strictly sorted: {}", e))
            })?;
        }
        let fst = Map::new(builder.into_inner()?)?;
        Ok(SortedDictionary { values, fst })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn value(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    pub fn code(&self, value: &str) -> Option<u32> {
        self.fst.get(value.as_bytes()).map(|code| code as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.values.iter().enumerate().map(|(code, value)| (code as u32, value.as_str()))
    }

    /// Codes of every value starting with `prefix`, in order
    pub fn prefix_codes(&self, prefix: &str) -> Vec<u32> {
        let mut codes = Vec::new();
        let mut stream = self.fst.range().ge(prefix.as_bytes()).into_stream();
        while let Some((key, code)) = stream.next() {
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            codes.push(code as u32);
        }
        codes
    }

    /// Code range of values within lexicographic bounds; `None` ends are open
    pub fn code_range(&self, lower: Option<(&str, bool)>, upper: Option<(&str, bool)>) -> Range<u32> {
        let start = match lower {
            Some((value, strict)) => self.values.partition_point(|v| {
                if strict { v.as_str() <= value } else { v.as_str() < value }
            }),
            None => 0,
        };
        let end = match upper {
            Some((value, strict)) => self.values.partition_point(|v| {
                if strict { v.as_str() < value } else { v.as_str() <= value }
            }),
            None => self.values.len(),
        };
        start as u32..end.max(start) as u32
    }
}
