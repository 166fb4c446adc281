//! Object keys, packed like integers. The null key is never stored.

use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::Encoding;
use crate::leaf_array::integer::{pack, unpack, width_for};
use crate::leaf_array::LeafArray;
use crate::types::ObjKey;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayKeyNonNullable {
    values: Vec<ObjKey>,
}

impl LeafArray for ArrayKeyNonNullable {
    type Value = ObjKey;

    const ENCODING: Encoding = Encoding::KeyNonNullable;

    vec_leaf_ops!(ObjKey);

    fn default_value() -> ObjKey {
        ObjKey(0)
    }

    fn set(&mut self, ndx: usize, value: ObjKey) {
        assert!(!value.is_null(), "null key stored in a non-nullable key column");
        self.values[ndx] = value;
    }

    fn insert(&mut self, ndx: usize, value: ObjKey) {
        assert!(!value.is_null(), "null key stored in a non-nullable key column");
        self.values.insert(ndx, value);
    }

    fn encode(&self, out: &mut Vec<u8>) -> u8 {
        let width = self.values.iter().map(|k| width_for(k.0)).max().unwrap_or(0);
        pack(self.values.iter().map(|k| k.0), width, out);
        width
    }

    fn decode(width: u8, count: usize, payload: &[u8]) -> BTreeResult<Self> {
        let values: Vec<ObjKey> = unpack(payload, width, count)?
            .into_iter()
            .map(ObjKey)
            .collect();
        if let Some(pos) = values.iter().position(|k| k.is_null()) {
            return Err(BPlusTreeError::data_integrity(
                "key leaf",
                &format!("null key at {}", pos),
            ));
        }
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        let mut array = ArrayKeyNonNullable::new();
        for key in [0, 3, 70000, 12] {
            array.add(ObjKey(key));
        }
        let mut out = Vec::new();
        let width = array.encode(&mut out);
        assert_eq!(width, 4);
        assert_eq!(ArrayKeyNonNullable::decode(width, 4, &out).unwrap(), array);
    }

    #[test]
    #[should_panic(expected = "null key")]
    fn null_key_is_rejected() {
        let mut array = ArrayKeyNonNullable::new();
        array.add(ObjKey::NULL);
    }

    #[test]
    fn decode_rejects_stored_null() {
        let mut out = Vec::new();
        pack([5i64, -1].into_iter(), 1, &mut out);
        assert!(ArrayKeyNonNullable::decode(1, 2, &out)
            .unwrap_err()
            .is_corruption());
    }
}
