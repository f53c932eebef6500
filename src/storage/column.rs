use roaring::RoaringBitmap;
use std::ops::Range;
use crate::aggregation::value::Value;
use crate::compression::compress::{EncodedIntegerBlock, IntegerEncodingType};
use crate::compression::delta::DeltaEncoder;
use crate::core::error::{Error, Result};
use crate::core::types::{Interval, Timestamp};
use crate::index::dictionary::SortedDictionary;
use crate::storage::segment::{DimensionData, MetricData};

/// Row timestamps, non-decreasing in row order
#[derive(Debug, Clone, PartialEq)]
pub struct TimeColumn {
    pub values: Vec<Timestamp>,
}

impl TimeColumn {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: u32) -> Option<Timestamp> {
        self.values.get(row as usize).copied()
    }

    pub fn min(&self) -> Option<Timestamp> {
        self.values.first().copied()
    }

    pub fn max(&self) -> Option<Timestamp> {
        self.values.last().copied()
    }

    /// Rows whose timestamp falls in `interval`, by binary search
    pub fn row_range(&self, interval: &Interval) -> Range<u32> {
        let start = self.values.partition_point(|&ts| ts < interval.start);
        let end = self.values.partition_point(|&ts| ts < interval.end).max(start);
        start as u32..end as u32
    }

    pub fn encode(&self) -> Vec<u8> {
        DeltaEncoder::encode_i64_list(&self.values)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let values = DeltaEncoder::decode_i64_list(bytes)?;
        if values.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::corrupted("Time column is not sorted"));
        }
        Ok(TimeColumn { values })
    }
}

/// Dictionary-encoded dimension: sorted dictionary, per-row codes (CSR
/// layout for multi-value rows) and one row bitmap per code.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionColumn {
    pub name: String,
    pub dictionary: SortedDictionary,
    pub offsets: Vec<u32>,
    pub codes: Vec<u32>,
    pub bitmaps: Vec<RoaringBitmap>,
    pub nulls: RoaringBitmap,
    pub multi_value: bool,
}

impl DimensionColumn {
    /// Builds the column from per-row sorted codes already in final row order
    pub fn from_rows(name: &str, dictionary: SortedDictionary, rows: &[&[u32]]) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut codes = Vec::new();
        let mut bitmaps = vec![RoaringBitmap::new(); dictionary.len()];
        let mut nulls = RoaringBitmap::new();
        let mut multi_value = false;

        offsets.push(0);
        for (row, row_codes) in rows.iter().enumerate() {
            if row_codes.is_empty() {
                nulls.insert(row as u32);
            }
            multi_value |= row_codes.len() > 1;
            for &code in row_codes.iter() {
                bitmaps[code as usize].insert(row as u32);
                codes.push(code);
            }
            offsets.push(codes.len() as u32);
        }

        DimensionColumn {
            name: name.to_string(),
            dictionary,
            offsets,
            codes,
            bitmaps,
            nulls,
            multi_value,
        }
    }

    pub fn row_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn cardinality(&self) -> usize {
        self.dictionary.len()
    }

    pub fn row_codes(&self, row: u32) -> &[u32] {
        let row = row as usize;
        match (self.offsets.get(row), self.offsets.get(row + 1)) {
            (Some(&start), Some(&end)) => &self.codes[start as usize..end as usize],
            _ => &[],
        }
    }

    /// Decoded values of one row; empty for null
    pub fn row_values(&self, row: u32) -> Vec<&str> {
        self.row_codes(row).iter().filter_map(|&code| self.dictionary.value(code)).collect()
    }

    pub fn bitmap(&self, code: u32) -> Option<&RoaringBitmap> {
        self.bitmaps.get(code as usize)
    }

    /// Union of the bitmaps of every code in `codes`
    pub fn union_of(&self, codes: impl IntoIterator<Item = u32>) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        for code in codes {
            if let Some(bitmap) = self.bitmaps.get(code as usize) {
                out |= bitmap;
            }
        }
        out
    }

    /// Rough in-memory footprint used by segment metadata
    pub fn size_estimate(&self) -> u64 {
        let dictionary: usize = self.dictionary.values().iter().map(String::len).sum();
        let bitmaps: u64 = self.bitmaps.iter().map(|b| b.serialized_size() as u64).sum();
        dictionary as u64 + (self.offsets.len() + self.codes.len()) as u64 * 4 + bitmaps
    }

    pub fn to_data(&self) -> Result<DimensionData> {
        let mut bitmaps = Vec::with_capacity(self.bitmaps.len());
        for bitmap in &self.bitmaps {
            let mut bytes = Vec::with_capacity(bitmap.serialized_size());
            bitmap.serialize_into(&mut bytes)?;
            bitmaps.push(bytes);
        }
        let mut null_bitmap = Vec::with_capacity(self.nulls.serialized_size());
        self.nulls.serialize_into(&mut null_bitmap)?;

        Ok(DimensionData {
            name: self.name.clone(),
            values: self.dictionary.values().to_vec(),
            offsets: EncodedIntegerBlock::encode(&self.offsets, IntegerEncodingType::Delta),
            codes: EncodedIntegerBlock::encode(&self.codes, IntegerEncodingType::VByte),
            bitmaps,
            null_bitmap,
            multi_value: self.multi_value,
        })
    }

    /// Rehydrates and checks the column against the segment row count
    pub fn from_data(data: DimensionData, row_count: usize) -> Result<Self> {
        let dictionary = SortedDictionary::from_sorted(data.values)?;
        let offsets = data.offsets.decode()?;
        let codes = data.codes.decode()?;

        if offsets.len() != row_count + 1 || offsets.first() != Some(&0) {
            return Err(Error::corrupted(format!("Dimension '{}' has a bad offset table", data.name)));
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) || offsets.last().copied() != Some(codes.len() as u32) {
            return Err(Error::corrupted(format!("Dimension '{}' offsets do not match its codes", data.name)));
        }
        if codes.iter().any(|&code| code as usize >= dictionary.len()) {
            return Err(Error::corrupted(format!("Dimension '{}' has a code outside its dictionary", data.name)));
        }
        if data.bitmaps.len() != dictionary.len() {
            return Err(Error::corrupted(format!("Dimension '{}' bitmap count mismatch", data.name)));
        }

        let mut bitmaps = Vec::with_capacity(data.bitmaps.len());
        for bytes in &data.bitmaps {
            bitmaps.push(RoaringBitmap::deserialize_from(&bytes[..])?);
        }
        let nulls = RoaringBitmap::deserialize_from(&data.null_bitmap[..])?;

        Ok(DimensionColumn {
            name: data.name,
            dictionary,
            offsets,
            codes,
            bitmaps,
            nulls,
            multi_value: data.multi_value,
        })
    }
}

/// Finalized aggregator output per row
#[derive(Debug, Clone, PartialEq)]
pub struct MetricColumn {
    pub name: String,
    pub type_name: String,
    pub values: Vec<Value>,
}

impl MetricColumn {
    pub fn get(&self, row: u32) -> Option<&Value> {
        self.values.get(row as usize)
    }

    pub fn to_data(&self) -> MetricData {
        MetricData {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            values: self.values.clone(),
        }
    }

    pub fn from_data(data: MetricData, row_count: usize) -> Result<Self> {
        if data.values.len() != row_count {
            return Err(Error::corrupted(format!(
                "Metric '{}' has {} values for {} rows",
                data.name,
                data.values.len(),
                row_count
            )));
        }
        Ok(MetricColumn {
            name: data.name,
            type_name: data.type_name,
            values: data.values,
        })
    }
}
