//! Per-column secondary indexes over base-row values.
//!
//! Each data column may have at most one index slot, chosen as either an
//! ordered backend (the B+ tree, supporting range scans) or an unordered
//! backend (a hash map, point lookups only). Maintenance calls queue into a
//! per-column pending pool rather than touching the backend immediately;
//! the pool is flushed into the backend the next time that column is read,
//! keeping the cost of a tight insert loop off the index's critical path.

use std::collections::HashMap;

use crate::bptree::BPlusTree;
use crate::config::{OrderedBackend, StoreConfig, UnorderedBackend};
use crate::error::{Error, Result};
use crate::page_directory::{Area, PageDirectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Insert(i64, u64),
    Delete(i64, u64),
}

#[derive(Debug)]
enum Backend {
    Ordered(BPlusTree<i64, u64>),
    Unordered(HashMap<i64, Vec<u64>>),
}

#[derive(Debug)]
struct IndexSlot {
    backend: Backend,
    unique: bool,
    pending: Vec<Pending>,
}

/// The full set of index slots for one table, one per data column.
#[derive(Debug)]
pub struct IndexLayer {
    cfg: StoreConfig,
    slots: Vec<Option<IndexSlot>>,
}

impl IndexLayer {
    pub fn new(num_columns: usize, cfg: StoreConfig) -> Self {
        Self {
            cfg,
            slots: (0..num_columns).map(|_| None).collect(),
        }
    }

    pub fn has_index(&self, column: usize) -> bool {
        self.slots.get(column).map(|s| s.is_some()).unwrap_or(false)
    }

    /// Builds an index for `column` over `dir`'s current base rows.
    /// `ordered` selects a range-capable B+ tree backend over a point-only
    /// hash map, per `cfg.index_ordered_backend` / `index_unordered_backend`.
    pub fn create_index(
        &mut self,
        column: usize,
        dir: &PageDirectory,
        unique: bool,
        ordered: bool,
    ) -> Result<()> {
        if self.has_index(column) {
            return Err(Error::AlreadyExists(column));
        }

        let mut backend = if ordered {
            match self.cfg.index_ordered_backend {
                OrderedBackend::BPlusTree => Backend::Ordered(BPlusTree::new(
                    self.cfg.b_plus_tree_minimum_degree,
                    unique,
                    self.cfg.b_plus_tree_search_algorithm_threshold,
                )),
            }
        } else {
            match self.cfg.index_unordered_backend {
                UnorderedBackend::HashMap => Backend::Unordered(HashMap::new()),
            }
        };

        for (rid, value) in dir.column_values(Area::Base, column)? {
            insert_into_backend(&mut backend, unique, value, rid)?;
        }

        self.slots[column] = Some(IndexSlot {
            backend,
            unique,
            pending: Vec::new(),
        });
        Ok(())
    }

    pub fn drop_index(&mut self, column: usize) -> Result<()> {
        if self.slots[column].take().is_none() {
            return Err(Error::NotFound(format!("no index on column {column}")));
        }
        Ok(())
    }

    /// Queue an insert maintenance event; applied lazily on next read.
    pub fn maintain_insert(&mut self, column: usize, value: i64, rid: u64) {
        if let Some(slot) = self.slots[column].as_mut() {
            slot.pending.push(Pending::Insert(value, rid));
        }
    }

    /// Queue a delete maintenance event (row tombstoned, or superseded
    /// value removed from the index).
    pub fn maintain_delete(&mut self, column: usize, value: i64, rid: u64) {
        if let Some(slot) = self.slots[column].as_mut() {
            slot.pending.push(Pending::Delete(value, rid));
        }
    }

    /// A changed value on an already-indexed column: equivalent to a
    /// delete of the old entry followed by an insert of the new one.
    pub fn maintain_update(&mut self, column: usize, old_value: i64, new_value: i64, rid: u64) {
        if self.slots[column].is_some() {
            self.maintain_delete(column, old_value, rid);
            self.maintain_insert(column, new_value, rid);
        }
    }

    fn flush(&mut self, column: usize) -> Result<()> {
        let slot = match self.slots[column].as_mut() {
            Some(s) => s,
            None => return Ok(()),
        };
        if slot.pending.is_empty() {
            return Ok(());
        }
        let mut pending = std::mem::take(&mut slot.pending);
        // Ordered backends benefit from inserting ascending keys (fewer node
        // splits), but a Delete must stay where it was queued relative to
        // the Inserts around it, or a value that gets deleted and
        // re-inserted within the same batch could end up duplicated. Sort
        // only within each maximal run of consecutive Inserts.
        if matches!(slot.backend, Backend::Ordered(_)) {
            let mut start = 0;
            while start < pending.len() {
                let mut end = start;
                while end < pending.len() && matches!(pending[end], Pending::Insert(_, _)) {
                    end += 1;
                }
                pending[start..end].sort_by_key(|event| match event {
                    Pending::Insert(value, _) => *value,
                    Pending::Delete(..) => unreachable!(),
                });
                start = end + 1;
            }
        }
        for event in pending {
            match event {
                Pending::Insert(value, rid) => {
                    insert_into_backend(&mut slot.backend, slot.unique, value, rid)?;
                }
                Pending::Delete(value, rid) => {
                    remove_from_backend(&mut slot.backend, value, rid);
                }
            }
        }
        Ok(())
    }

    /// RIDs whose value in `column` equals `value`. Uses the index if
    /// present (flushing pending maintenance first); otherwise falls back
    /// to a linear scan over `dir`.
    pub fn locate(&mut self, column: usize, value: i64, dir: &PageDirectory) -> Result<Vec<u64>> {
        if self.has_index(column) {
            self.flush(column)?;
            let slot = self.slots[column].as_ref().unwrap();
            Ok(match &slot.backend {
                Backend::Ordered(tree) => tree.get(&value),
                Backend::Unordered(map) => map.get(&value).cloned().unwrap_or_default(),
            })
        } else {
            Ok(dir
                .column_values(Area::Base, column)?
                .into_iter()
                .filter(|(_, v)| *v == value)
                .map(|(rid, _)| rid)
                .collect())
        }
    }

    /// `(value, rid)` pairs with `lo <= value <= hi` (bounds optional), in
    /// ascending value order when backed by the ordered backend; falls
    /// back to a linear scan (unsorted) when unindexed or hash-backed.
    pub fn locate_range(
        &mut self,
        column: usize,
        lo: Option<i64>,
        hi: Option<i64>,
        dir: &PageDirectory,
    ) -> Result<Vec<(i64, u64)>> {
        if self.has_index(column) {
            self.flush(column)?;
            let slot = self.slots[column].as_ref().unwrap();
            match &slot.backend {
                Backend::Ordered(tree) => Ok(tree.get_range(lo.as_ref(), hi.as_ref())),
                Backend::Unordered(map) => Ok(map
                    .iter()
                    .flat_map(|(&v, rids)| rids.iter().map(move |&r| (v, r)))
                    .filter(|(v, _)| lo.map(|lo| *v >= lo).unwrap_or(true))
                    .filter(|(v, _)| hi.map(|hi| *v <= hi).unwrap_or(true))
                    .collect()),
            }
        } else {
            Ok(dir
                .column_values(Area::Base, column)?
                .into_iter()
                .filter(|(_, v)| lo.map(|lo| *v >= lo).unwrap_or(true))
                .filter(|(_, v)| hi.map(|hi| *v <= hi).unwrap_or(true))
                .map(|(rid, v)| (v, rid))
                .collect())
        }
    }
}

fn insert_into_backend(backend: &mut Backend, unique: bool, value: i64, rid: u64) -> Result<()> {
    match backend {
        Backend::Ordered(tree) => tree.insert(value, rid),
        Backend::Unordered(map) => {
            let bucket = map.entry(value).or_default();
            if unique && !bucket.is_empty() {
                return Err(Error::DuplicateKey);
            }
            bucket.push(rid);
            Ok(())
        }
    }
}

fn remove_from_backend(backend: &mut Backend, value: i64, rid: u64) {
    match backend {
        Backend::Ordered(tree) => {
            let _ = tree.remove(&value, Some(&rid));
        }
        Backend::Unordered(map) => {
            if let Some(bucket) = map.get_mut(&value) {
                bucket.retain(|&r| r != rid);
                if bucket.is_empty() {
                    map.remove(&value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::META_COLUMNS;

    fn dir_with_rows(rows: &[i64]) -> PageDirectory {
        let mut dir = PageDirectory::new(META_COLUMNS + 1, StoreConfig::default());
        for &v in rows {
            dir.add_record(&[-1, 0, 0, 0, v], Area::Base).unwrap();
        }
        dir
    }

    #[test]
    fn create_index_bootstraps_from_existing_rows() {
        let dir = dir_with_rows(&[10, 20, 30]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        idx.create_index(META_COLUMNS, &dir, true, true).unwrap();
        assert_eq!(idx.locate(META_COLUMNS, 20, &dir).unwrap(), vec![1]);
    }

    #[test]
    fn maintain_insert_is_lazily_flushed_on_locate() {
        let dir = dir_with_rows(&[]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        idx.create_index(META_COLUMNS, &dir, true, true).unwrap();
        idx.maintain_insert(META_COLUMNS, 99, 5);
        assert_eq!(idx.locate(META_COLUMNS, 99, &dir).unwrap(), vec![5]);
    }

    #[test]
    fn locate_without_index_falls_back_to_scan() {
        let dir = dir_with_rows(&[1, 2, 3, 2]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        let mut got = idx.locate(META_COLUMNS, 2, &dir).unwrap();
        got.sort();
        assert_eq!(got, vec![1, 3]);
    }

    #[test]
    fn maintain_update_moves_entry_between_values() {
        let dir = dir_with_rows(&[1, 2, 3]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        idx.create_index(META_COLUMNS, &dir, true, true).unwrap();
        idx.maintain_update(META_COLUMNS, 2, 200, 1);
        assert!(idx.locate(META_COLUMNS, 2, &dir).unwrap().is_empty());
        assert_eq!(idx.locate(META_COLUMNS, 200, &dir).unwrap(), vec![1]);
    }

    #[test]
    fn locate_range_respects_bounds() {
        let dir = dir_with_rows(&[5, 1, 9, 3, 7]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        idx.create_index(META_COLUMNS, &dir, false, true).unwrap();
        let mut got = idx.locate_range(META_COLUMNS, Some(3), Some(7), &dir).unwrap();
        got.sort();
        assert_eq!(got, vec![(3, 3), (5, 0), (7, 4)]);
    }

    #[test]
    fn flush_sorts_a_run_of_inserts_on_an_ordered_backend() {
        let dir = dir_with_rows(&[]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        idx.create_index(META_COLUMNS, &dir, false, true).unwrap();
        for v in [9, 1, 7, 3, 5, 2, 8, 4, 6] {
            idx.maintain_insert(META_COLUMNS, v, v as u64);
        }
        let mut got = idx.locate_range(META_COLUMNS, Some(1), Some(9), &dir).unwrap();
        got.sort();
        assert_eq!(got, (1..=9).map(|v| (v, v as u64)).collect::<Vec<_>>());
    }

    #[test]
    fn flush_keeps_delete_ordering_around_a_sorted_insert_run() {
        let dir = dir_with_rows(&[2]);
        let mut idx = IndexLayer::new(META_COLUMNS + 1, StoreConfig::default());
        idx.create_index(META_COLUMNS, &dir, true, true).unwrap();
        // Toggle the same rid's value back and forth before anything reads
        // the column, so the pending pool holds an interleaved
        // delete/insert/delete/insert sequence for a single key.
        idx.maintain_update(META_COLUMNS, 2, 200, 0);
        idx.maintain_update(META_COLUMNS, 200, 2, 0);
        assert_eq!(idx.locate(META_COLUMNS, 2, &dir).unwrap(), vec![0]);
        assert!(idx.locate(META_COLUMNS, 200, &dir).unwrap().is_empty());
    }
}
