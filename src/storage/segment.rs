use chrono::{DateTime, Utc};
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::aggregation::registry::AggregatorSpec;
use crate::aggregation::value::Value;
use crate::compression::compress::{CompressedBlock, CompressionType, EncodedIntegerBlock};
use crate::core::error::{Error, Result};
use crate::core::types::Interval;
use crate::query::granularity::Granularity;

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub id: SegmentId,
    pub created_at: DateTime<Utc>,
    pub interval: Interval,             // [min row time, max row time + 1)
    pub row_count: u32,
    pub granularity: Granularity,       // Ingest truncation the rows went through
    pub dimensions: Vec<String>,
    pub metrics: Vec<AggregatorSpec>,   // Ingest aggregators, one per metric column
}

/// Persisted form of one dimension column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionData {
    pub name: String,
    pub values: Vec<String>,            // Sorted dictionary, code == index
    pub offsets: EncodedIntegerBlock,   // Row r owns codes[offsets[r]..offsets[r + 1]]
    pub codes: EncodedIntegerBlock,
    pub bitmaps: Vec<Vec<u8>>,          // Portable roaring bitmap per code
    pub null_bitmap: Vec<u8>,
    pub multi_value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub name: String,
    pub type_name: String,
    pub values: Vec<Value>,             // Finalized value per row
}

/// Everything a durable store keeps for a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    pub metadata: SegmentMetadata,
    pub time: Vec<u8>,                  // Zigzag delta varints
    pub dimensions: Vec<DimensionData>,
    pub metrics: Vec<MetricData>,
}

/// Segment file header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHeader {
    pub version: u32,     // Format version
    pub compression: CompressionType,
    pub checksum: u32,    // CRC32 of the payload
    pub payload_len: u64,
}

impl SegmentHeader {
    pub const MAGIC: [u8; 8] = *b"OLAPDEX\0";
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 8 + 4 + 1 + 4 + 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&Self::MAGIC);
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12] = self.compression.tag();
        out[13..17].copy_from_slice(&self.checksum.to_le_bytes());
        out[17..25].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::corrupted(format!("Segment shorter than its {}-byte header", Self::SIZE)));
        }
        if bytes[0..8] != Self::MAGIC {
            return Err(Error::corrupted("Not a segment file (bad magic)"));
        }

        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[8..12]);
        let version = u32::from_le_bytes(word);
        if version != Self::VERSION {
            return Err(Error::corrupted(format!("Unsupported segment version {}", version)));
        }
        let compression = CompressionType::from_tag(bytes[12])?;
        word.copy_from_slice(&bytes[13..17]);
        let checksum = u32::from_le_bytes(word);
        let mut long = [0u8; 8];
        long.copy_from_slice(&bytes[17..25]);

        Ok(SegmentHeader {
            version,
            compression,
            checksum,
            payload_len: u64::from_le_bytes(long),
        })
    }
}

impl SegmentData {
    // [ HEADER (magic, version, compression, crc, length) ]
    // [ PAYLOAD (compressed bincode) ]
    pub fn encode(&self, compression: CompressionType) -> Result<Vec<u8>> {
        let raw = bincode::serialize(self)?;
        let block = CompressedBlock::compress(&raw, compression)?;

        let mut payload = Vec::with_capacity(8 + block.data.len());
        payload.extend_from_slice(&(block.original_size as u64).to_le_bytes());
        payload.extend_from_slice(&block.data);

        let header = SegmentHeader {
            version: SegmentHeader::VERSION,
            compression,
            checksum: crc32fast::hash(&payload),
            payload_len: payload.len() as u64,
        };

        let mut out = Vec::with_capacity(SegmentHeader::SIZE + payload.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = SegmentHeader::from_bytes(bytes)?;
        let payload = &bytes[SegmentHeader::SIZE..];
        if payload.len() as u64 != header.payload_len {
            return Err(Error::corrupted(format!(
                "Segment payload is {} bytes, header says {}",
                payload.len(),
                header.payload_len
            )));
        }
        if crc32fast::hash(payload) != header.checksum {
            return Err(Error::corrupted("Segment checksum mismatch"));
        }
        if payload.len() < 8 {
            return Err(Error::corrupted("Segment payload lacks its size prefix"));
        }

        let mut long = [0u8; 8];
        long.copy_from_slice(&payload[..8]);
        let original_size = usize::try_from(u64::from_le_bytes(long))
            .map_err(|_| Error::corrupted("Segment payload size overflows"))?;
        let block = CompressedBlock::from_parts(payload[8..].to_vec(), original_size, header.compression);
        let raw = block.decompress()?;

        bincode::deserialize(&raw).map_err(|e| Error::corrupted(format!("Segment body: {}", e)))
    }
}
