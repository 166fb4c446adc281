//! Fixed 16-byte header at the start of every node block.
//!
//! ```text
//! byte 0      flags (0x80 inner, 0x40 has refs)
//! byte 1      encoding tag
//! byte 2      element width in bytes
//! bytes 3..8  zero
//! bytes 8..16 element or child count, u64 little endian
//! ```

use crate::error::{BPlusTreeError, BTreeResult};
use crate::types::MAX_NODE_SIZE;

pub const HEADER_SIZE: usize = 16;

const FLAG_INNER: u8 = 0x80;
const FLAG_HAS_REFS: u8 = 0x40;

/// Payload layout of a node block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Encoding {
    Inner = 0,
    Integer = 1,
    IntNull = 2,
    Double = 3,
    String = 4,
    KeyNonNullable = 5,
}

impl Encoding {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Inner),
            1 => Some(Self::Integer),
            2 => Some(Self::IntNull),
            3 => Some(Self::Double),
            4 => Some(Self::String),
            5 => Some(Self::KeyNonNullable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub is_inner: bool,
    pub has_refs: bool,
    pub encoding: Encoding,
    pub width: u8,
    pub size: usize,
}

impl NodeHeader {
    pub fn leaf(encoding: Encoding, width: u8, size: usize) -> Self {
        Self {
            is_inner: false,
            has_refs: false,
            encoding,
            width,
            size,
        }
    }

    pub fn inner(child_count: usize) -> Self {
        Self {
            is_inner: true,
            has_refs: true,
            encoding: Encoding::Inner,
            width: 8,
            size: child_count,
        }
    }

    /// Parse the header at the front of `bytes`.
    pub fn parse(bytes: &[u8]) -> BTreeResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(BPlusTreeError::corrupted_tree(
                "header",
                &format!("block of {} bytes is shorter than a header", bytes.len()),
            ));
        }
        let flags = bytes[0];
        let encoding = Encoding::from_tag(bytes[1]).ok_or_else(|| {
            BPlusTreeError::corrupted_tree("header", &format!("unknown encoding tag {}", bytes[1]))
        })?;
        let is_inner = flags & FLAG_INNER != 0;
        if is_inner != (encoding == Encoding::Inner) {
            return Err(BPlusTreeError::corrupted_tree(
                "header",
                &format!("flags {:#04x} disagree with encoding {:?}", flags, encoding),
            ));
        }
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[8..HEADER_SIZE]);
        let size = usize::try_from(u64::from_le_bytes(size)).map_err(|_| {
            BPlusTreeError::corrupted_tree("header", "element count does not fit in memory")
        })?;
        if size > MAX_NODE_SIZE {
            return Err(BPlusTreeError::corrupted_tree(
                "header",
                &format!("element count {} exceeds {}", size, MAX_NODE_SIZE),
            ));
        }
        Ok(Self {
            is_inner,
            has_refs: flags & FLAG_HAS_REFS != 0,
            encoding,
            width: bytes[2],
            size,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut flags = 0;
        if self.is_inner {
            flags |= FLAG_INNER;
        }
        if self.has_refs {
            flags |= FLAG_HAS_REFS;
        }
        out.extend_from_slice(&[flags, self.encoding.tag(), self.width, 0, 0, 0, 0, 0]);
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_back_written_header() {
        let mut out = Vec::new();
        NodeHeader::leaf(Encoding::IntNull, 2, 300).write_to(&mut out);
        assert_eq!(out.len(), HEADER_SIZE);
        let header = NodeHeader::parse(&out).unwrap();
        assert!(!header.is_inner);
        assert_eq!(header.encoding, Encoding::IntNull);
        assert_eq!(header.width, 2);
        assert_eq!(header.size, 300);
    }

    #[test]
    fn parse_rejects_bad_blocks() {
        assert!(NodeHeader::parse(&[0u8; 4]).unwrap_err().is_corruption());

        let mut out = Vec::new();
        NodeHeader::inner(3).write_to(&mut out);
        out[1] = 42;
        assert!(NodeHeader::parse(&out).is_err());

        let mut out = Vec::new();
        NodeHeader::inner(3).write_to(&mut out);
        out[0] = 0;
        assert!(NodeHeader::parse(&out).is_err());
    }

    #[test]
    fn parse_rejects_oversized_count() {
        let mut out = Vec::new();
        NodeHeader::leaf(Encoding::Integer, 0, MAX_NODE_SIZE).write_to(&mut out);
        assert_eq!(NodeHeader::parse(&out).unwrap().size, MAX_NODE_SIZE);

        let mut out = Vec::new();
        NodeHeader::inner(usize::MAX / 8).write_to(&mut out);
        assert!(NodeHeader::parse(&out).unwrap_err().is_corruption());

        out[8..HEADER_SIZE].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(NodeHeader::parse(&out).unwrap_err().is_corruption());
    }
}
