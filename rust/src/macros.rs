//! Internal macros for the leaf encodings and column aliases.
//!
//! ## vec_leaf_ops!
//!
//! Expands, inside an `impl LeafArray for X` block, the operations every
//! encoding backed by a `values: Vec<_>` field shares. Each encoding still
//! writes its own `set`, `insert`, `encode` and `decode`.
//!
//! ## column_types!
//!
//! Maps element types to their leaf encoding and declares the
//! `<Alias>Column` tree alias for each one:
//!
//! ```ignore
//! column_types! {
//!     i64 => ArrayInteger as Int,
//! }
//! // impl ColumnType for i64 { type Leaf = ArrayInteger; }
//! // pub type IntColumn = BPlusTree<i64>;
//! ```

macro_rules! vec_leaf_ops {
    ($value:ty) => {
        fn new() -> Self {
            Self { values: Vec::new() }
        }

        fn size(&self) -> usize {
            self.values.len()
        }

        fn get(&self, ndx: usize) -> $value {
            self.values[ndx].clone()
        }

        fn erase(&mut self, ndx: usize) {
            self.values.remove(ndx);
        }

        fn truncate_and_destroy_children(&mut self, ndx: usize) {
            self.values.truncate(ndx);
        }

        fn find_first(&self, value: &$value, begin: usize, end: usize) -> usize {
            self.values[begin..end]
                .iter()
                .position(|v| v == value)
                .map_or($crate::types::NOT_FOUND, |pos| pos + begin)
        }

        fn split_off(&mut self, at: usize) -> Self {
            Self {
                values: self.values.split_off(at),
            }
        }

        fn append(&mut self, other: &mut Self) {
            self.values.append(&mut other.values);
        }
    };
}

macro_rules! column_types {
    ($($ty:ty => $leaf:ident as $alias:ident),* $(,)?) => {
        ::paste::paste! {
            $(
                impl $crate::leaf_array::ColumnType for $ty {
                    type Leaf = $crate::leaf_array::$leaf;
                }

                #[doc = concat!("A column of `", stringify!($ty), "` values.")]
                pub type [<$alias Column>] = $crate::types::BPlusTree<$ty>;
            )*
        }
    };
}
