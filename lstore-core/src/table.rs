//! The versioned record protocol: a `Table` owns one `PageDirectory`, one
//! `IndexLayer` keyed on the primary key plus any secondary indexes, and
//! the monotonic clock used to stamp row versions.

use crate::config::{
    StoreConfig, INDIRECTION_COLUMN, META_COLUMNS, NULL_SENTINEL, RID_COLUMN,
    SCHEMA_ENCODING_COLUMN,
};
use crate::error::{Error, Result};
use crate::index::IndexLayer;
use crate::page_directory::{Area, PageDirectory};

pub struct Table {
    name: String,
    num_columns: usize,
    primary_key: usize,
    cfg: StoreConfig,
    dir: PageDirectory,
    index: IndexLayer,
    clock: u64,
}

impl Table {
    pub fn new(name: impl Into<String>, num_columns: usize, primary_key: usize, cfg: StoreConfig) -> Result<Self> {
        if primary_key >= num_columns {
            return Err(Error::OutOfBounds(format!(
                "primary key column {primary_key} out of bounds ({num_columns} columns)"
            )));
        }
        let dir = PageDirectory::new(META_COLUMNS + num_columns, cfg.clone());
        let mut index = IndexLayer::new(META_COLUMNS + num_columns, cfg.clone());
        index.create_index(META_COLUMNS + primary_key, &dir, true, true)?;

        Ok(Self {
            name: name.into(),
            num_columns,
            primary_key,
            cfg,
            dir,
            index,
            clock: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn primary_key(&self) -> usize {
        self.primary_key
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Secondary index on a data column (0-based, excluding meta columns).
    /// The primary key already has one from construction.
    pub fn create_index(&mut self, column: usize, unique: bool, ordered: bool) -> Result<()> {
        if column >= self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "column {column} out of bounds ({} columns)",
                self.num_columns
            )));
        }
        self.index
            .create_index(META_COLUMNS + column, &self.dir, unique, ordered)
    }

    pub fn drop_index(&mut self, column: usize) -> Result<()> {
        if column == self.primary_key {
            return Err(Error::Integrity(
                "cannot drop the primary key index".to_string(),
            ));
        }
        self.index.drop_index(META_COLUMNS + column)
    }

    pub fn insert(&mut self, values: &[i64]) -> Result<u64> {
        if values.len() != self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "insert expected {} values, got {}",
                self.num_columns,
                values.len()
            )));
        }

        let pk_value = values[self.primary_key];
        if !self
            .index
            .locate(META_COLUMNS + self.primary_key, pk_value, &self.dir)?
            .is_empty()
        {
            return Err(Error::DuplicateKey);
        }

        let ts = self.tick();
        let mut row = Vec::with_capacity(META_COLUMNS + self.num_columns);
        row.push(NULL_SENTINEL); // indirection: no tail version yet
        row.push(0); // RID placeholder, overwritten below with the real rid
        row.push(ts as i64);
        row.push(0); // schema encoding: a base row is always fully populated
        row.extend_from_slice(values);

        let rid = self.dir.add_record(&row, Area::Base)?;
        self.dir.set(Area::Base, rid, RID_COLUMN, rid as i64)?;

        for c in 0..self.num_columns {
            if self.index.has_index(META_COLUMNS + c) {
                self.index.maintain_insert(META_COLUMNS + c, values[c], rid);
            }
        }
        Ok(rid)
    }

    fn locate_live(&mut self, key: i64) -> Result<u64> {
        let hits = self
            .index
            .locate(META_COLUMNS + self.primary_key, key, &self.dir)?;
        let base_rid = *hits
            .first()
            .ok_or_else(|| Error::NotFound(format!("key {key} not found")))?;
        if self.dir.get(Area::Base, base_rid, RID_COLUMN)? == NULL_SENTINEL {
            return Err(Error::NotFound(format!("key {key} not found")));
        }
        Ok(base_rid)
    }

    fn head(&self, base_rid: u64) -> Result<(Area, u64)> {
        let indirection = self.dir.get(Area::Base, base_rid, INDIRECTION_COLUMN)?;
        if indirection == NULL_SENTINEL {
            Ok((Area::Base, base_rid))
        } else {
            Ok((Area::Tail, indirection as u64))
        }
    }

    /// Reconstruct the `num_columns`-wide data row as of `target`.
    ///
    /// In cumulative mode every tail row is a full snapshot, so this is a
    /// direct read. In delta mode a tail row carries only the columns its
    /// update actually changed (per `SCHEMA_ENCODING_COLUMN`'s bitmask);
    /// this walks the indirection chain from `target` back toward the base
    /// row, taking each column's value from the newest row that set it.
    fn reconstruct_row(&self, base_rid: u64, target: (Area, u64)) -> Result<Vec<i64>> {
        if self.cfg.lstore_is_cumulative {
            let (area, rid) = target;
            return (0..self.num_columns)
                .map(|c| self.dir.get(area, rid, META_COLUMNS + c))
                .collect();
        }

        let mut result: Vec<Option<i64>> = vec![None; self.num_columns];
        let mut cur = target;
        loop {
            let (area, rid) = cur;
            let schema = self.dir.get(area, rid, SCHEMA_ENCODING_COLUMN)?;
            for c in 0..self.num_columns {
                if result[c].is_none() && (area == Area::Base || (schema >> c) & 1 == 1) {
                    result[c] = Some(self.dir.get(area, rid, META_COLUMNS + c)?);
                }
            }
            if area == Area::Base || result.iter().all(Option::is_some) {
                break;
            }
            let pred = self.dir.get(Area::Tail, rid, INDIRECTION_COLUMN)?;
            cur = if pred == NULL_SENTINEL {
                (Area::Base, base_rid)
            } else {
                (Area::Tail, pred as u64)
            };
        }
        Ok(result.into_iter().map(|v| v.expect("base row fills every column")).collect())
    }

    pub fn delete(&mut self, key: i64) -> Result<()> {
        let base_rid = self.locate_live(key)?;
        let head = self.head(base_rid)?;
        let row = self.reconstruct_row(base_rid, head)?;

        self.dir.set(Area::Base, base_rid, RID_COLUMN, NULL_SENTINEL)?;

        for c in 0..self.num_columns {
            if self.index.has_index(META_COLUMNS + c) {
                self.index.maintain_delete(META_COLUMNS + c, row[c], base_rid);
            }
        }
        Ok(())
    }

    /// `new_values[c] = Some(v)` overwrites column `c`; `None` leaves it at
    /// its current value (cumulative mode) or unset for this version
    /// (delta mode). The primary key column is immutable.
    pub fn update(&mut self, key: i64, new_values: &[Option<i64>]) -> Result<()> {
        if new_values.len() != self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "update expected {} values, got {}",
                self.num_columns,
                new_values.len()
            )));
        }
        if new_values[self.primary_key].is_some() {
            return Err(Error::Integrity(
                "primary key column is immutable".to_string(),
            ));
        }

        let base_rid = self.locate_live(key)?;
        let head = self.head(base_rid)?;
        let old_values = self.reconstruct_row(base_rid, head)?;

        let data_values: Vec<i64> = (0..self.num_columns)
            .map(|c| {
                new_values[c].unwrap_or(if self.cfg.lstore_is_cumulative {
                    old_values[c]
                } else {
                    NULL_SENTINEL
                })
            })
            .collect();

        let mut schema_encoding: i64 = 0;
        for (c, v) in new_values.iter().enumerate() {
            if v.is_some() {
                schema_encoding |= 1 << c;
            }
        }

        let base_indirection = self.dir.get(Area::Base, base_rid, INDIRECTION_COLUMN)?;
        let ts = self.tick();
        let mut row = Vec::with_capacity(META_COLUMNS + self.num_columns);
        row.push(base_indirection);
        row.push(0); // RID placeholder
        row.push(ts as i64);
        row.push(schema_encoding);
        row.extend_from_slice(&data_values);

        let tail_rid = self.dir.add_record(&row, Area::Tail)?;
        self.dir.set(Area::Tail, tail_rid, RID_COLUMN, tail_rid as i64)?;
        self.dir
            .set(Area::Base, base_rid, INDIRECTION_COLUMN, tail_rid as i64)?;

        for (c, new_val) in new_values.iter().enumerate() {
            if let Some(new_val) = new_val {
                if self.index.has_index(META_COLUMNS + c) {
                    self.index
                        .maintain_update(META_COLUMNS + c, old_values[c], *new_val, base_rid);
                }
            }
        }
        Ok(())
    }

    /// The row as of `version` steps back from the newest (`0` = latest,
    /// negative values walk further into history).
    pub fn select_version(&mut self, key: i64, version: i64) -> Result<Vec<i64>> {
        let base_rid = self.locate_live(key)?;
        let target = self.dir.resolve_version(base_rid, version)?;
        self.reconstruct_row(base_rid, target)
    }

    pub fn sum_version(
        &mut self,
        start_key: i64,
        end_key: i64,
        column: usize,
        version: i64,
    ) -> Result<i64> {
        if column >= self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "column {column} out of bounds ({} columns)",
                self.num_columns
            )));
        }
        let pairs = self.index.locate_range(
            META_COLUMNS + self.primary_key,
            Some(start_key),
            Some(end_key),
            &self.dir,
        )?;

        let mut total = 0i64;
        for (_, base_rid) in pairs {
            if self.dir.get(Area::Base, base_rid, RID_COLUMN)? == NULL_SENTINEL {
                continue;
            }
            let target = self.dir.resolve_version(base_rid, version)?;
            let row = self.reconstruct_row(base_rid, target)?;
            total += row[column];
        }
        Ok(total)
    }

    /// Reads column `column` at the latest version and writes back `+1`,
    /// leaving every other column untouched.
    pub fn increment(&mut self, key: i64, column: usize) -> Result<()> {
        if column >= self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "column {column} out of bounds ({} columns)",
                self.num_columns
            )));
        }
        let row = self.select_version(key, 0)?;
        let mut new_values = vec![None; self.num_columns];
        new_values[column] = Some(row[column] + 1);
        self.update(key, &new_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cumulative: bool) -> Table {
        let cfg = StoreConfig {
            lstore_is_cumulative: cumulative,
            ..StoreConfig::default()
        };
        Table::new("grades", 3, 0, cfg).unwrap()
    }

    #[test]
    fn insert_then_select_round_trips() {
        let mut t = table(false);
        t.insert(&[1, 10, 100]).unwrap();
        t.insert(&[2, 20, 200]).unwrap();
        assert_eq!(t.select_version(1, 0).unwrap(), vec![1, 10, 100]);
        assert_eq!(t.select_version(2, 0).unwrap(), vec![2, 20, 200]);
    }

    #[test]
    fn duplicate_primary_key_is_rejected() {
        let mut t = table(false);
        t.insert(&[1, 10, 100]).unwrap();
        assert_eq!(t.insert(&[1, 11, 101]), Err(Error::DuplicateKey));
    }

    #[test]
    fn update_then_select_version_walks_history() {
        let mut t = table(false);
        t.insert(&[1, 10, 100]).unwrap();
        t.update(1, &[None, Some(11), None]).unwrap();
        t.update(1, &[None, Some(12), None]).unwrap();

        assert_eq!(t.select_version(1, 0).unwrap(), vec![1, 12, 100]);
        assert_eq!(t.select_version(1, -1).unwrap(), vec![1, 11, 100]);
        assert_eq!(t.select_version(1, -2).unwrap(), vec![1, 10, 100]);
        // chain exhausted: falls back to the base row
        assert_eq!(t.select_version(1, -5).unwrap(), vec![1, 10, 100]);
    }

    #[test]
    fn delete_tombstones_and_hides_the_row() {
        let mut t = table(false);
        t.insert(&[1, 10, 100]).unwrap();
        t.delete(1).unwrap();
        assert!(matches!(t.select_version(1, 0), Err(Error::NotFound(_))));
        assert!(matches!(t.delete(1), Err(Error::NotFound(_))));
    }

    #[test]
    fn sum_version_adds_a_column_over_a_key_range() {
        let mut t = table(false);
        for k in 1..=5 {
            t.insert(&[k, k * 10, 0]).unwrap();
        }
        assert_eq!(t.sum_version(2, 4, 1, 0).unwrap(), 20 + 30 + 40);
    }

    #[test]
    fn sum_version_cumulative_vs_delta_agree_on_latest() {
        for cumulative in [false, true] {
            let mut t = table(cumulative);
            t.insert(&[1, 5, 0]).unwrap();
            t.insert(&[2, 7, 0]).unwrap();
            t.update(1, &[None, Some(50), None]).unwrap();
            assert_eq!(t.sum_version(1, 2, 1, 0).unwrap(), 57, "cumulative={cumulative}");
        }
    }

    #[test]
    fn increment_reads_latest_and_writes_back_plus_one() {
        let mut t = table(false);
        t.insert(&[1, 0, 0]).unwrap();
        t.increment(1, 1).unwrap();
        t.increment(1, 1).unwrap();
        assert_eq!(t.select_version(1, 0).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn updating_primary_key_is_rejected() {
        let mut t = table(false);
        t.insert(&[1, 10, 100]).unwrap();
        assert!(matches!(
            t.update(1, &[Some(2), None, None]),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn secondary_index_locates_by_value() {
        let mut t = table(false);
        t.insert(&[1, 10, 100]).unwrap();
        t.insert(&[2, 20, 100]).unwrap();
        t.create_index(1, true, true).unwrap();
        assert_eq!(t.select_version(2, 0).unwrap()[1], 20);
        assert!(t.drop_index(0).is_err(), "primary key index cannot be dropped");
        t.drop_index(1).unwrap();
    }
}
