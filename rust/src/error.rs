//! Error handling and result types for column tree operations.
//!
//! Precondition violations (out-of-range indices, using an unattached tree)
//! panic. Everything the allocator or the persisted bytes can get wrong is
//! reported through [`BPlusTreeError`].

use thiserror::Error;

/// Error type for B+ tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BPlusTreeError {
    /// Invalid node capacity specified.
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),
    /// Internal data structure integrity violation.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),
    /// The allocator refused to hand out a block.
    #[error("Allocation error: {0}")]
    AllocationError(String),
    /// A reference that does not name a live block.
    #[error("Invalid reference: {0}")]
    InvalidRef(String),
    /// Tree corruption detected while decoding or validating.
    #[error("Corrupted tree: {0}")]
    CorruptedTree(String),
    /// Invalid tree state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BPlusTreeError {
    /// Create an InvalidCapacity error with context
    pub fn invalid_capacity(capacity: usize, min_required: usize) -> Self {
        Self::InvalidCapacity(format!(
            "Capacity {} is invalid (minimum required: {})",
            capacity, min_required
        ))
    }

    /// Create an InvalidCapacity error for a capacity above the hard cap
    pub fn capacity_too_large(capacity: usize, max_allowed: usize) -> Self {
        Self::InvalidCapacity(format!(
            "Capacity {} is invalid (maximum allowed: {})",
            capacity, max_allowed
        ))
    }

    /// Create a DataIntegrityError with context
    pub fn data_integrity(context: &str, details: &str) -> Self {
        Self::DataIntegrityError(format!("{}: {}", context, details))
    }

    /// Create an AllocationError with context
    pub fn allocation_error(resource: &str, reason: &str) -> Self {
        Self::AllocationError(format!("Failed to allocate {}: {}", resource, reason))
    }

    /// Create an InvalidRef error for `r`
    pub fn invalid_ref(r: u64, details: &str) -> Self {
        Self::InvalidRef(format!("ref {}: {}", r, details))
    }

    /// Create a CorruptedTree error with context
    pub fn corrupted_tree(component: &str, details: &str) -> Self {
        Self::CorruptedTree(format!("{} corruption: {}", component, details))
    }

    /// Create an InvalidState error with context
    pub fn invalid_state(operation: &str, state: &str) -> Self {
        Self::InvalidState(format!("Cannot {} in state: {}", operation, state))
    }

    pub fn is_allocation_error(&self) -> bool {
        matches!(self, Self::AllocationError(_))
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptedTree(_) | Self::DataIntegrityError(_))
    }
}

/// Public result type for tree operations that may fail
pub type BTreeResult<T> = Result<T, BPlusTreeError>;

/// Result type for tree construction and attachment
pub type InitResult<T> = Result<T, BPlusTreeError>;

/// Result extension trait for attaching context to errors
pub trait BTreeResultExt<T> {
    /// Prefix the error message with `context`
    fn with_context(self, context: &str) -> BTreeResult<T>;
}

impl<T> BTreeResultExt<T> for Result<T, BPlusTreeError> {
    fn with_context(self, context: &str) -> BTreeResult<T> {
        self.map_err(|e| match e {
            BPlusTreeError::InvalidCapacity(msg) => {
                BPlusTreeError::InvalidCapacity(format!("{}: {}", context, msg))
            }
            BPlusTreeError::DataIntegrityError(msg) => {
                BPlusTreeError::data_integrity(context, &msg)
            }
            BPlusTreeError::AllocationError(msg) => {
                BPlusTreeError::AllocationError(format!("{}: {}", context, msg))
            }
            BPlusTreeError::InvalidRef(msg) => {
                BPlusTreeError::InvalidRef(format!("{}: {}", context, msg))
            }
            BPlusTreeError::CorruptedTree(msg) => BPlusTreeError::corrupted_tree(context, &msg),
            BPlusTreeError::InvalidState(msg) => BPlusTreeError::invalid_state(context, &msg),
        })
    }
}
