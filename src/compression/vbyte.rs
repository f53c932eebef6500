use crate::core::error::{Error, ErrorKind, Result};

/// Variable byte encoding for integers (best for small integers)
pub struct VByteEncoder;

impl VByteEncoder {
    /// Encode single u32 value
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(output: &mut Vec<u8>, value: u32) {
        Self::encode_u64(output, value as u64);
    }

    /// Encode single u64 value, up to 10 bytes
    pub fn encode_u64(output: &mut Vec<u8>, mut value: u64) {
        while value >= 128 {
            output.push((value & 127) as u8 | 128);  // Set continuation bit
            value >>= 7;
        }
        output.push(value as u8);
    }

    /// Encode array of u32 values
    pub fn encode_u32_list(nums: &[u32]) -> Vec<u8> {
        let mut output = Vec::with_capacity(nums.len());
        for &num in nums {
            Self::encode_u32(&mut output, num);
        }
        output
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let (value, consumed) = Self::decode_u64(input)?;
        let value = u32::try_from(value)
            .map_err(|_| Error::new(ErrorKind::Parse, "VByte overflow".to_string()))?;
        Ok((value, consumed))
    }

    /// Decode single u64 value, returns (value, bytes_consumed)
    pub fn decode_u64(input: &[u8]) -> Result<(u64, usize)> {
        let mut value = 0u64;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u64) << shift;

            if byte & 128 == 0 {  // No continuation bit
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 63 {
                return Err(Error::new(ErrorKind::Parse, "VByte overflow".to_string()));
            }
        }

        Err(Error::new(ErrorKind::Parse, "Incomplete VByte".to_string()))
    }

    /// Decode array of u32 values
    pub fn decode_u32_list(data: &[u8]) -> Result<Vec<u32>> {
        let mut nums = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let (value, consumed) = Self::decode_u32(&data[pos..])?;
            nums.push(value);
            pos += consumed;
        }

        Ok(nums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_codes_take_one_byte() {
        let encoded = VByteEncoder::encode_u32_list(&[0, 1, 127]);
        assert_eq!(encoded.len(), 3);
        assert_eq!(VByteEncoder::decode_u32_list(&encoded).unwrap(), vec![0, 1, 127]);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut encoded = Vec::new();
        VByteEncoder::encode_u32(&mut encoded, 300_000);
        encoded.pop();
        assert_eq!(VByteEncoder::decode_u32(&encoded).unwrap_err().kind, ErrorKind::Parse);
    }

    #[test]
    fn oversized_value_does_not_fit_u32() {
        let mut encoded = Vec::new();
        VByteEncoder::encode_u64(&mut encoded, u64::from(u32::MAX) + 1);
        assert!(VByteEncoder::decode_u32(&encoded).is_err());
        assert_eq!(VByteEncoder::decode_u64(&encoded).unwrap().0, u64::from(u32::MAX) + 1);
    }
}
