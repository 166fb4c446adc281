//! Width-adaptive packed integers.
//!
//! All elements share one width, the smallest of 0, 1, 2, 4 or 8 bytes that
//! holds every value. Width 0 means every element is zero and the payload is
//! empty. Values are stored little endian and sign-extended on read.

use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::Encoding;
use crate::leaf_array::LeafArray;
use crate::types::MAX_NODE_SIZE;

/// Bytes needed to store `value`.
pub(crate) fn width_for(value: i64) -> u8 {
    if value == 0 {
        0
    } else if i8::try_from(value).is_ok() {
        1
    } else if i16::try_from(value).is_ok() {
        2
    } else if i32::try_from(value).is_ok() {
        4
    } else {
        8
    }
}

pub(crate) fn pack(values: impl Iterator<Item = i64>, width: u8, out: &mut Vec<u8>) {
    let width = width as usize;
    if width == 0 {
        return;
    }
    for value in values {
        out.extend_from_slice(&value.to_le_bytes()[..width]);
    }
}

pub(crate) fn unpack(payload: &[u8], width: u8, count: usize) -> BTreeResult<Vec<i64>> {
    if !matches!(width, 0 | 1 | 2 | 4 | 8) {
        return Err(BPlusTreeError::corrupted_tree(
            "integer leaf",
            &format!("unsupported width {}", width),
        ));
    }
    if count > MAX_NODE_SIZE {
        return Err(BPlusTreeError::corrupted_tree(
            "integer leaf",
            &format!("element count {} exceeds {}", count, MAX_NODE_SIZE),
        ));
    }
    let width = width as usize;
    if width == 0 {
        return Ok(vec![0; count]);
    }
    let needed = match width.checked_mul(count) {
        Some(needed) if needed <= payload.len() => needed,
        _ => {
            return Err(BPlusTreeError::corrupted_tree(
                "integer leaf",
                &format!(
                    "{} elements of width {} do not fit in {} bytes",
                    count,
                    width,
                    payload.len()
                ),
            ))
        }
    };
    Ok(payload[..needed]
        .chunks_exact(width)
        .map(|chunk| {
            let fill = if chunk[width - 1] & 0x80 != 0 { 0xff } else { 0 };
            let mut bytes = [fill; 8];
            bytes[..width].copy_from_slice(chunk);
            i64::from_le_bytes(bytes)
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayInteger {
    values: Vec<i64>,
}

impl ArrayInteger {
    /// Width the current contents would be written with.
    pub fn width(&self) -> u8 {
        self.values.iter().map(|&v| width_for(v)).max().unwrap_or(0)
    }
}

impl LeafArray for ArrayInteger {
    type Value = i64;

    const ENCODING: Encoding = Encoding::Integer;

    vec_leaf_ops!(i64);

    fn default_value() -> i64 {
        0
    }

    fn set(&mut self, ndx: usize, value: i64) {
        self.values[ndx] = value;
    }

    fn insert(&mut self, ndx: usize, value: i64) {
        self.values.insert(ndx, value);
    }

    fn encode(&self, out: &mut Vec<u8>) -> u8 {
        let width = self.width();
        pack(self.values.iter().copied(), width, out);
        width
    }

    fn decode(width: u8, count: usize, payload: &[u8]) -> BTreeResult<Self> {
        Ok(Self {
            values: unpack(payload, width, count)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(array: &ArrayInteger) -> (u8, ArrayInteger) {
        let mut out = Vec::new();
        let width = array.encode(&mut out);
        let back = ArrayInteger::decode(width, array.size(), &out).unwrap();
        (width, back)
    }

    #[test]
    fn width_grows_with_values() {
        let mut array = ArrayInteger::new();
        for (value, width) in [
            (0, 0),
            (1, 1),
            (127, 1),
            (256, 2),
            (65536, 4),
            (4294967296, 8),
        ] {
            array.add(value);
            let (w, back) = round_trip(&array);
            assert_eq!(w, width, "after adding {}", value);
            assert_eq!(back, array);
        }
    }

    #[test]
    fn negative_values_sign_extend() {
        let mut array = ArrayInteger::new();
        for value in [-1, -256, -65536, -4294967296, i64::MIN, i64::MAX] {
            array.add(value);
        }
        let (width, back) = round_trip(&array);
        assert_eq!(width, 8);
        assert_eq!(back, array);

        let mut small = ArrayInteger::new();
        small.add(-128);
        small.add(-1);
        let (width, back) = round_trip(&small);
        assert_eq!(width, 1);
        assert_eq!(back.get(0), -128);
        assert_eq!(back.get(1), -1);
    }

    #[test]
    fn all_zero_payload_is_empty() {
        let mut array = ArrayInteger::new();
        for _ in 0..5 {
            array.add(0);
        }
        let mut out = Vec::new();
        assert_eq!(array.encode(&mut out), 0);
        assert!(out.is_empty());
        assert_eq!(ArrayInteger::decode(0, 5, &out).unwrap(), array);
    }

    #[test]
    fn decode_rejects_short_payload() {
        assert!(unpack(&[1, 2, 3], 2, 2).unwrap_err().is_corruption());
        assert!(unpack(&[1, 2, 3], 3, 1).is_err());
    }

    #[test]
    fn decode_rejects_huge_count() {
        assert_eq!(unpack(&[], 0, MAX_NODE_SIZE).unwrap().len(), MAX_NODE_SIZE);
        assert!(unpack(&[], 0, MAX_NODE_SIZE + 1).unwrap_err().is_corruption());
        assert!(unpack(&[], 0, usize::MAX).unwrap_err().is_corruption());
        assert!(unpack(&[0; 16], 8, usize::MAX / 4).unwrap_err().is_corruption());
    }

    #[test]
    fn find_first_respects_range() {
        let mut array = ArrayInteger::new();
        for value in [5, 7, 5, 9] {
            array.add(value);
        }
        assert_eq!(array.find_first(&5, 0, 4), 0);
        assert_eq!(array.find_first(&5, 1, 4), 2);
        assert_eq!(array.find_first(&5, 3, 4), crate::types::NOT_FOUND);
    }
}
