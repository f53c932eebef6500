use crate::compression::delta::DeltaEncoder;
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};
use serde::{Serialize, Deserialize};

/// Compressed block storage for a persisted segment payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    LZ4,      // Fast, default for segments
    Zstd,     // Better ratio, slower
    Snappy,
}

impl CompressionType {
    /// Single-byte tag written into the segment file header
    pub fn tag(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::LZ4 => 1,
            CompressionType::Zstd => 2,
            CompressionType::Snappy => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::LZ4),
            2 => Ok(CompressionType::Zstd),
            3 => Ok(CompressionType::Snappy),
            other => Err(Error::corrupted(format!("Unknown compression tag {}", other))),
        }
    }
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Result<Self> {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),

            CompressionType::LZ4 => lz4_flex::block::compress(data),

            CompressionType::Zstd => {
                zstd::encode_all(data, 3)?  // Level 3 is balanced
            }

            CompressionType::Snappy => {
                let mut encoder = snap::raw::Encoder::new();
                encoder.compress_vec(data)
                    .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))?
            }
        };

        Ok(CompressedBlock {
            data: compressed,
            original_size: data.len(),
            compression,
        })
    }

    /// Rebuild a block from header fields read off disk
    pub fn from_parts(data: Vec<u8>, original_size: usize, compression: CompressionType) -> Self {
        CompressedBlock { data, original_size, compression }
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        let bytes = match self.compression {
            CompressionType::None => self.data.clone(),

            CompressionType::LZ4 => {
                lz4_flex::block::decompress(&self.data, self.original_size)
                    .map_err(|e| Error::corrupted(format!("LZ4: {}", e)))?
            }

            CompressionType::Zstd => {
                zstd::decode_all(&self.data[..])
                    .map_err(|e| Error::corrupted(format!("Zstd: {}", e)))?
            }

            CompressionType::Snappy => {
                let mut decoder = snap::raw::Decoder::new();
                decoder.decompress_vec(&self.data)
                    .map_err(|e| Error::corrupted(format!("Snappy: {}", e)))?
            }
        };

        if bytes.len() != self.original_size {
            return Err(Error::corrupted(format!(
                "Decompressed {} bytes, expected {}",
                bytes.len(),
                self.original_size
            )));
        }
        Ok(bytes)
    }

    pub fn ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 1.0;
        }
        self.original_size as f64 / self.data.len() as f64
    }
}

/// Integer array stored with one of the integer codecs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedIntegerBlock {
    pub data: Vec<u8>,
    pub original_count: usize,  // Number of integers
    pub encoding: IntegerEncodingType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerEncodingType {
    None,      // Raw u32 array (4 bytes each)
    Delta,     // Non-decreasing sequences (CSR offsets)
    VByte,     // Small integers (dictionary codes)
}

impl EncodedIntegerBlock {
    pub fn encode(nums: &[u32], encoding: IntegerEncodingType) -> Self {
        let encoded = match encoding {
            IntegerEncodingType::None => {
                let mut bytes = Vec::with_capacity(nums.len() * 4);
                for &num in nums {
                    bytes.extend_from_slice(&num.to_le_bytes());
                }
                bytes
            }
            IntegerEncodingType::Delta => DeltaEncoder::encode_u32_list(nums),
            IntegerEncodingType::VByte => VByteEncoder::encode_u32_list(nums),
        };

        EncodedIntegerBlock {
            data: encoded,
            original_count: nums.len(),
            encoding,
        }
    }

    pub fn decode(&self) -> Result<Vec<u32>> {
        let nums = match self.encoding {
            IntegerEncodingType::None => {
                if self.data.len() % 4 != 0 {
                    return Err(Error::corrupted("Raw integer block is not a multiple of 4 bytes"));
                }
                self.data.chunks_exact(4)
                    .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect()
            }
            IntegerEncodingType::Delta => DeltaEncoder::decode_u32_list(&self.data)?,
            IntegerEncodingType::VByte => VByteEncoder::decode_u32_list(&self.data)?,
        };

        if nums.len() != self.original_count {
            return Err(Error::corrupted(format!(
                "Integer block holds {} values, header says {}",
                nums.len(),
                self.original_count
            )));
        }
        Ok(nums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"colo,pool,report,URL\n".repeat(64)
    }

    #[test]
    fn every_codec_restores_the_payload() {
        let payload = sample();
        for compression in [CompressionType::None, CompressionType::LZ4, CompressionType::Zstd, CompressionType::Snappy] {
            let block = CompressedBlock::compress(&payload, compression).unwrap();
            assert_eq!(block.decompress().unwrap(), payload, "{:?}", compression);
        }
    }

    #[test]
    fn repetitive_payload_shrinks() {
        let block = CompressedBlock::compress(&sample(), CompressionType::LZ4).unwrap();
        assert!(block.ratio() > 2.0);
    }

    #[test]
    fn tags_are_stable() {
        assert_eq!(CompressionType::from_tag(CompressionType::Zstd.tag()).unwrap(), CompressionType::Zstd);
        assert_eq!(CompressionType::from_tag(9).unwrap_err().kind, ErrorKind::Corrupted);
    }

    #[test]
    fn count_mismatch_is_corruption() {
        let mut block = EncodedIntegerBlock::encode(&[3, 1, 2], IntegerEncodingType::VByte);
        block.original_count = 4;
        assert_eq!(block.decode().unwrap_err().kind, ErrorKind::Corrupted);
    }
}
