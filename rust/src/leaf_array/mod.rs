//! Packed leaf encodings and the mapping from element type to encoding.
//!
//! A leaf node owns one [`LeafArray`]. The tree algorithms only use the
//! operations of this trait, so a new element type needs a new encoding and
//! one line in the `column_types!` table below.

use std::fmt::Debug;

use crate::error::BTreeResult;
use crate::header::Encoding;

mod double;
mod int_null;
mod integer;
mod key;
mod string;

pub use double::ArrayDouble;
pub use int_null::ArrayIntNull;
pub use integer::ArrayInteger;
pub use key::ArrayKeyNonNullable;
pub use string::ArrayString;

use crate::types::ObjKey;

/// Operations a leaf encoding supports.
pub trait LeafArray: Clone + Debug {
    type Value: Clone + PartialEq + Debug;

    /// Tag written into the block header of every leaf using this encoding.
    const ENCODING: Encoding;

    /// An empty array.
    fn new() -> Self;

    /// Value used to fill new slots.
    fn default_value() -> Self::Value;

    fn size(&self) -> usize;
    fn get(&self, ndx: usize) -> Self::Value;
    fn set(&mut self, ndx: usize, value: Self::Value);
    fn insert(&mut self, ndx: usize, value: Self::Value);

    fn add(&mut self, value: Self::Value) {
        let ndx = self.size();
        self.insert(ndx, value);
    }

    fn erase(&mut self, ndx: usize);

    /// Drop every element from `ndx` onwards.
    fn truncate_and_destroy_children(&mut self, ndx: usize);

    /// Index of the first element in `begin..end` equal to `value`, or
    /// `NOT_FOUND`.
    fn find_first(&self, value: &Self::Value, begin: usize, end: usize) -> usize;

    /// Move the elements from `at` onwards into a new array.
    fn split_off(&mut self, at: usize) -> Self;

    /// Move all elements of `other` to the end of `self`.
    fn append(&mut self, other: &mut Self);

    /// Append the packed payload to `out` and return the element width.
    fn encode(&self, out: &mut Vec<u8>) -> u8;

    /// Rebuild an array from a payload written by `encode`.
    fn decode(width: u8, count: usize, payload: &[u8]) -> BTreeResult<Self>;
}

/// Element types that have a leaf encoding.
pub trait ColumnType: Clone + PartialEq + Debug + Sized {
    type Leaf: LeafArray<Value = Self>;
}

column_types! {
    i64 => ArrayInteger as Int,
    Option<i64> => ArrayIntNull as IntNull,
    f64 => ArrayDouble as Double,
    String => ArrayString as String,
    ObjKey => ArrayKeyNonNullable as Key,
}
