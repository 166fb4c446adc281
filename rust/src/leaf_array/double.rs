use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::Encoding;
use crate::leaf_array::LeafArray;

/// Doubles stored as 8 little-endian bytes each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayDouble {
    values: Vec<f64>,
}

impl LeafArray for ArrayDouble {
    type Value = f64;

    const ENCODING: Encoding = Encoding::Double;

    vec_leaf_ops!(f64);

    fn default_value() -> f64 {
        0.0
    }

    fn set(&mut self, ndx: usize, value: f64) {
        self.values[ndx] = value;
    }

    fn insert(&mut self, ndx: usize, value: f64) {
        self.values.insert(ndx, value);
    }

    fn encode(&self, out: &mut Vec<u8>) -> u8 {
        for value in &self.values {
            out.extend_from_slice(&value.to_le_bytes());
        }
        8
    }

    fn decode(width: u8, count: usize, payload: &[u8]) -> BTreeResult<Self> {
        let needed = match count.checked_mul(8) {
            Some(needed) if width == 8 && needed <= payload.len() => needed,
            _ => {
                return Err(BPlusTreeError::corrupted_tree(
                    "double leaf",
                    &format!("{} bytes of width {} for {} elements", payload.len(), width, count),
                ))
            }
        };
        let values = payload[..needed]
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                f64::from_le_bytes(bytes)
            })
            .collect();
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bit_exact() {
        let mut array = ArrayDouble::new();
        for value in [0.0, -1.5, f64::MAX, f64::MIN_POSITIVE, 1e-300] {
            array.add(value);
        }
        let mut out = Vec::new();
        let width = array.encode(&mut out);
        assert_eq!(out.len(), 40);
        assert_eq!(ArrayDouble::decode(width, 5, &out).unwrap(), array);
        assert!(ArrayDouble::decode(4, 5, &out).is_err());
    }

    #[test]
    fn decode_rejects_huge_count() {
        let out = [0u8; 16];
        assert!(ArrayDouble::decode(8, usize::MAX / 4, &out)
            .unwrap_err()
            .is_corruption());
        assert!(ArrayDouble::decode(8, 3, &out).is_err());
        assert_eq!(ArrayDouble::decode(8, 2, &out).unwrap().size(), 2);
    }
}
