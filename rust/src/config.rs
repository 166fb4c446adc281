//! Tree configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BPlusTreeError, InitResult};
use crate::types::{DEFAULT_MAX_NODE_SIZE, MAX_NODE_SIZE, MIN_NODE_SIZE};

/// Per-tree tuning knobs, embeddable in an engine's own config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum number of elements in a leaf and children in an inner node.
    pub max_node_size: usize,
    /// Keep the most recently touched leaf decoded between calls.
    pub leaf_cache: bool,
}

impl TreeConfig {
    pub fn new(max_node_size: usize) -> Self {
        Self {
            max_node_size,
            ..Self::default()
        }
    }

    pub fn with_leaf_cache(mut self, enabled: bool) -> Self {
        self.leaf_cache = enabled;
        self
    }

    pub fn validate(&self) -> InitResult<()> {
        if self.max_node_size < MIN_NODE_SIZE {
            return Err(BPlusTreeError::invalid_capacity(
                self.max_node_size,
                MIN_NODE_SIZE,
            ));
        }
        if self.max_node_size > MAX_NODE_SIZE {
            return Err(BPlusTreeError::capacity_too_large(
                self.max_node_size,
                MAX_NODE_SIZE,
            ));
        }
        Ok(())
    }

    /// Nodes below this size are merged or refilled from a sibling.
    pub fn min_node_size(&self) -> usize {
        self.max_node_size / 2
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_node_size: DEFAULT_MAX_NODE_SIZE,
            leaf_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_enforces_minimum() {
        assert!(TreeConfig::default().validate().is_ok());
        assert!(TreeConfig::new(4).validate().is_ok());
        assert_eq!(
            TreeConfig::new(3).validate(),
            Err(BPlusTreeError::invalid_capacity(3, MIN_NODE_SIZE))
        );
        assert_eq!(TreeConfig::new(9).min_node_size(), 4);
    }

    #[test]
    fn validate_enforces_maximum() {
        assert!(TreeConfig::new(MAX_NODE_SIZE).validate().is_ok());
        assert_eq!(
            TreeConfig::new(MAX_NODE_SIZE + 1).validate(),
            Err(BPlusTreeError::capacity_too_large(MAX_NODE_SIZE + 1, MAX_NODE_SIZE))
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: TreeConfig = serde_json::from_str(r#"{"max_node_size": 16}"#).unwrap();
        assert_eq!(config, TreeConfig::new(16));
        assert!(config.leaf_cache);

        let json = serde_json::to_string(&TreeConfig::new(8).with_leaf_cache(false)).unwrap();
        let back: TreeConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.leaf_cache);
        assert_eq!(back.max_node_size, 8);
    }
}
