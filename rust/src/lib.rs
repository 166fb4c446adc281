//! Copy-on-write B+ trees for column storage.
//!
//! A column tree stores an ordered sequence of values addressed by position,
//! not by key. Leaves hold packed arrays of one element type, inner nodes
//! hold child refs and cumulative element counts, and every node lives in a
//! block of an [`Allocator`]. A tree can be reopened from its root ref, and
//! blocks frozen by [`Allocator::freeze`] are copied on first write so older
//! readers keep a consistent snapshot.
//!
//! ```
//! use column_bptree::{Allocator, IntColumn, TreeConfig};
//!
//! let mut column = IntColumn::with_config(Allocator::new(), TreeConfig::new(4)).unwrap();
//! column.create().unwrap();
//! for v in 0..10 {
//!     column.add(v).unwrap();
//! }
//! column.insert(0, -1).unwrap();
//! column.erase(5).unwrap();
//! assert_eq!(column.size(), 10);
//! assert_eq!(column.get(0).unwrap(), -1);
//! assert_eq!(column.find_first(&9).unwrap(), 9);
//! ```

#[macro_use]
mod macros;

mod alloc;
mod cache;
mod config;
mod error;
mod header;
mod inner;
mod leaf;
mod leaf_array;
mod node;
mod parent;
mod types;

mod construction;
mod delete_operations;
mod get_operations;
mod insert_operations;
mod iteration;
mod tree_structure;
mod validation;

pub use alloc::{Allocator, AllocatorStats};
pub use cache::LeafCache;
pub use config::TreeConfig;
pub use error::{BPlusTreeError, BTreeResult, BTreeResultExt, InitResult};
pub use header::{Encoding, NodeHeader, HEADER_SIZE};
pub use inner::InnerNode;
pub use iteration::Values;
pub use leaf::LeafNode;
pub use leaf_array::{
    ArrayDouble, ArrayIntNull, ArrayInteger, ArrayKeyNonNullable, ArrayString, ColumnType,
    DoubleColumn, IntColumn, IntNullColumn, KeyColumn, LeafArray, StringColumn,
};
pub use node::{Node, TraverseFunc};
pub use parent::{ArrayParent, ParentLink, RefSlots};
pub use types::*;
