//! Nullable integers: a null bitmap followed by packed values.

use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::Encoding;
use crate::leaf_array::integer::{pack, unpack, width_for};
use crate::leaf_array::LeafArray;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayIntNull {
    values: Vec<Option<i64>>,
}

impl LeafArray for ArrayIntNull {
    type Value = Option<i64>;

    const ENCODING: Encoding = Encoding::IntNull;

    vec_leaf_ops!(Option<i64>);

    fn default_value() -> Option<i64> {
        None
    }

    fn set(&mut self, ndx: usize, value: Option<i64>) {
        self.values[ndx] = value;
    }

    fn insert(&mut self, ndx: usize, value: Option<i64>) {
        self.values.insert(ndx, value);
    }

    fn encode(&self, out: &mut Vec<u8>) -> u8 {
        let mut bitmap = vec![0u8; self.values.len().div_ceil(8)];
        for (ndx, value) in self.values.iter().enumerate() {
            if value.is_none() {
                bitmap[ndx / 8] |= 1 << (ndx % 8);
            }
        }
        out.extend_from_slice(&bitmap);
        let width = self
            .values
            .iter()
            .map(|v| width_for(v.unwrap_or(0)))
            .max()
            .unwrap_or(0);
        pack(self.values.iter().map(|v| v.unwrap_or(0)), width, out);
        width
    }

    fn decode(width: u8, count: usize, payload: &[u8]) -> BTreeResult<Self> {
        let bitmap_len = count.div_ceil(8);
        if payload.len() < bitmap_len {
            return Err(BPlusTreeError::corrupted_tree(
                "nullable integer leaf",
                &format!("null bitmap needs {} bytes", bitmap_len),
            ));
        }
        let (bitmap, packed) = payload.split_at(bitmap_len);
        let values = unpack(packed, width, count)?
            .into_iter()
            .enumerate()
            .map(|(ndx, v)| {
                if bitmap[ndx / 8] & (1 << (ndx % 8)) != 0 {
                    None
                } else {
                    Some(v)
                }
            })
            .collect();
        Ok(Self { values })
    }
}
