use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};

/// Delta encoding for sorted integers (row offsets, time column)
pub struct DeltaEncoder;

impl DeltaEncoder {
    /// Encode a non-decreasing u32 array: first value raw, then VByte deltas
    pub fn encode_u32_list(nums: &[u32]) -> Vec<u8> {
        if nums.is_empty() {
            return Vec::new();
        }

        let mut output = Vec::with_capacity(4 + nums.len());
        output.extend_from_slice(&nums[0].to_le_bytes());

        for pair in nums.windows(2) {
            VByteEncoder::encode_u32(&mut output, pair[1].wrapping_sub(pair[0]));
        }

        output
    }

    pub fn decode_u32_list(data: &[u8]) -> Result<Vec<u32>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() < 4 {
            return Err(Error::new(ErrorKind::Parse, "Delta block shorter than its header".to_string()));
        }

        let first = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let mut nums = vec![first];
        let mut pos = 4;
        let mut prev = first;

        while pos < data.len() {
            let (delta, consumed) = VByteEncoder::decode_u32(&data[pos..])?;
            let val = prev.wrapping_add(delta);
            nums.push(val);
            prev = val;
            pos += consumed;
        }

        Ok(nums)
    }

    /// Encode timestamps as zigzag deltas. Sorted input gives small deltas,
    /// but any order round-trips.
    pub fn encode_i64_list(nums: &[i64]) -> Vec<u8> {
        let mut output = Vec::with_capacity(nums.len() * 2);
        let mut prev = 0i64;
        for &num in nums {
            VByteEncoder::encode_u64(&mut output, zigzag(num.wrapping_sub(prev)));
            prev = num;
        }
        output
    }

    pub fn decode_i64_list(data: &[u8]) -> Result<Vec<i64>> {
        let mut nums = Vec::new();
        let mut pos = 0;
        let mut prev = 0i64;

        while pos < data.len() {
            let (raw, consumed) = VByteEncoder::decode_u64(&data[pos..])?;
            prev = prev.wrapping_add(unzigzag(raw));
            nums.push(prev);
            pos += consumed;
        }

        Ok(nums)
    }
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
