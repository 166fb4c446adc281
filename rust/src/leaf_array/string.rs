//! Variable width strings, each a u32 length followed by UTF-8 bytes.

use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::Encoding;
use crate::leaf_array::LeafArray;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayString {
    values: Vec<String>,
}

/// Length prefix for a string of `len` bytes. Strings that do not fit a u32
/// prefix are rejected before they reach a leaf.
fn length_prefix(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(len) => len,
        Err(_) => panic!("string of {} bytes does not fit a u32 length prefix", len),
    }
}

fn truncated() -> BPlusTreeError {
    BPlusTreeError::corrupted_tree("string leaf", "payload ends inside an element")
}

impl LeafArray for ArrayString {
    type Value = String;

    const ENCODING: Encoding = Encoding::String;

    vec_leaf_ops!(String);

    fn default_value() -> String {
        String::new()
    }

    fn set(&mut self, ndx: usize, value: String) {
        length_prefix(value.len());
        self.values[ndx] = value;
    }

    fn insert(&mut self, ndx: usize, value: String) {
        length_prefix(value.len());
        self.values.insert(ndx, value);
    }

    fn encode(&self, out: &mut Vec<u8>) -> u8 {
        for value in &self.values {
            out.extend_from_slice(&length_prefix(value.len()).to_le_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        0
    }

    fn decode(_width: u8, count: usize, payload: &[u8]) -> BTreeResult<Self> {
        if count > payload.len() / 4 {
            return Err(truncated());
        }
        let mut values = Vec::with_capacity(count);
        let mut rest = payload;
        for _ in 0..count {
            if rest.len() < 4 {
                return Err(truncated());
            }
            let (len, tail) = rest.split_at(4);
            let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
            if tail.len() < len {
                return Err(truncated());
            }
            let (bytes, tail) = tail.split_at(len);
            let value = String::from_utf8(bytes.to_vec()).map_err(|e| {
                BPlusTreeError::corrupted_tree("string leaf", &e.to_string())
            })?;
            values.push(value);
            rest = tail;
        }
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_round_trip() {
        let mut array = ArrayString::new();
        for value in ["", "a", "grüße", "longer string with spaces"] {
            array.add(value.to_string());
        }
        let mut out = Vec::new();
        let width = array.encode(&mut out);
        let back = ArrayString::decode(width, 4, &out).unwrap();
        assert_eq!(back, array);
        assert_eq!(back.find_first(&"a".to_string(), 0, 4), 1);
    }

    #[test]
    fn rejects_truncated_and_invalid_utf8() {
        let mut array = ArrayString::new();
        array.add("hello".to_string());
        let mut out = Vec::new();
        array.encode(&mut out);
        assert!(ArrayString::decode(0, 1, &out[..6]).is_err());
        assert!(ArrayString::decode(0, 2, &out).is_err());

        let bad = [2, 0, 0, 0, 0xff, 0xfe];
        assert!(ArrayString::decode(0, 1, &bad).unwrap_err().is_corruption());
    }

    #[test]
    fn length_prefix_accepts_u32_range() {
        assert_eq!(length_prefix(0), 0);
        assert_eq!(length_prefix(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[should_panic(expected = "does not fit a u32 length prefix")]
    fn length_prefix_rejects_oversized_string() {
        length_prefix(u32::MAX as usize + 1);
    }

    #[test]
    fn rejects_count_larger_than_payload() {
        let empties = [0u8; 8];
        assert_eq!(ArrayString::decode(0, 2, &empties).unwrap().size(), 2);
        assert!(ArrayString::decode(0, 3, &empties).unwrap_err().is_corruption());
        assert!(ArrayString::decode(0, usize::MAX / 4, &empties)
            .unwrap_err()
            .is_corruption());
    }
}
