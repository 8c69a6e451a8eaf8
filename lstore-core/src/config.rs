//! Centralized store configuration.
//!
//! `StoreConfig` is a plain value passed into construction rather than a
//! process-wide singleton: it is cheap to `Clone` and every component that
//! needs a knob takes one by reference or by value at construction time
//! rather than reaching for global state.

/// Number of leading meta columns present in every row: INDIRECTION, RID,
/// TIMESTAMP, SCHEMA_ENCODING.
pub const META_COLUMNS: usize = 4;

pub const INDIRECTION_COLUMN: usize = 0;
pub const RID_COLUMN: usize = 1;
pub const TIMESTAMP_COLUMN: usize = 2;
pub const SCHEMA_ENCODING_COLUMN: usize = 3;

/// Sentinel cell value: "no predecessor" in the indirection chain, and the
/// tombstone value written to a base row's RID column on delete.
pub const NULL_SENTINEL: i64 = -1;

/// Which backend an index slot should use when it is ordered vs. unordered.
/// Both are real choices today (the B+ tree is the only ordered backend,
/// the hash map the only unordered one) but the enum keeps the door open
/// for e.g. a binary search tree backend without touching callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedBackend {
    BPlusTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnorderedBackend {
    HashMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Page size in bytes. Must be a multiple of `cell_width`.
    pub page_size: usize,
    /// Cell width in bytes (signed, two's complement).
    pub cell_width: usize,
    /// B+ tree minimum degree `t`.
    pub b_plus_tree_minimum_degree: usize,
    /// Node size below which a linear scan is used instead of binary search.
    pub b_plus_tree_search_algorithm_threshold: usize,
    /// Whether tail rows snapshot the full row (cumulative) or only the
    /// columns changed by that particular update (delta).
    pub lstore_is_cumulative: bool,
    pub index_ordered_backend: OrderedBackend,
    pub index_unordered_backend: UnorderedBackend,
}

impl StoreConfig {
    pub fn cells_per_page(&self) -> usize {
        self.page_size / self.cell_width
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            cell_width: 8,
            b_plus_tree_minimum_degree: 128,
            b_plus_tree_search_algorithm_threshold: 8,
            lstore_is_cumulative: false,
            index_ordered_backend: OrderedBackend::BPlusTree,
            index_unordered_backend: UnorderedBackend::HashMap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_holds_512_cells_of_width_8() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.cells_per_page(), 512);
    }
}
