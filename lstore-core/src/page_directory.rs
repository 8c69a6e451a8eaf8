//! Columnar page directory: the append-only Base/Tail storage areas and
//! the versioned-record addressing scheme over them.

use crate::config::{StoreConfig, INDIRECTION_COLUMN, NULL_SENTINEL, RID_COLUMN};
use crate::error::{Error, Result};
use crate::page::Page;

/// Which of the two append-only storage areas a RID lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Base,
    Tail,
}

/// Owns, per logical column, an ordered sequence of Base pages and an
/// ordered sequence of Tail pages. All column sequences within one area
/// grow in lockstep (same page count, same last-page occupancy) — see
/// `add_record`.
#[derive(Debug, Clone)]
pub struct PageDirectory {
    cfg: StoreConfig,
    num_columns: usize,
    base: Vec<Vec<Page>>,
    tail: Vec<Vec<Page>>,
    base_count: u64,
    tail_count: u64,
}

impl PageDirectory {
    pub fn new(num_columns: usize, cfg: StoreConfig) -> Self {
        Self {
            base: (0..num_columns).map(|_| Vec::new()).collect(),
            tail: (0..num_columns).map(|_| Vec::new()).collect(),
            num_columns,
            cfg,
            base_count: 0,
            tail_count: 0,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    fn area_pages(&self, area: Area) -> &Vec<Vec<Page>> {
        match area {
            Area::Base => &self.base,
            Area::Tail => &self.tail,
        }
    }

    fn area_pages_mut(&mut self, area: Area) -> &mut Vec<Vec<Page>> {
        match area {
            Area::Base => &mut self.base,
            Area::Tail => &mut self.tail,
        }
    }

    pub fn count(&self, area: Area) -> u64 {
        match area {
            Area::Base => self.base_count,
            Area::Tail => self.tail_count,
        }
    }

    fn locate(&self, rid: u64) -> (usize, usize) {
        let cells_per_page = self.cfg.cells_per_page();
        ((rid as usize) / cells_per_page, (rid as usize) % cells_per_page)
    }

    /// Append one row of `num_columns` cells to `area`, growing every
    /// column's page sequence in lockstep. Returns the assigned RID (the
    /// pre-increment counter).
    pub fn add_record(&mut self, values: &[i64], area: Area) -> Result<u64> {
        if values.len() != self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "add_record expected {} columns, got {}",
                self.num_columns,
                values.len()
            )));
        }

        let page_size = self.cfg.page_size;
        let cell_width = self.cfg.cell_width;
        let rid = self.count(area);

        let columns = self.area_pages_mut(area);
        for (c, &value) in values.iter().enumerate() {
            let col_pages = &mut columns[c];
            if col_pages.last().map(|p| !p.has_capacity()).unwrap_or(true) {
                col_pages.push(Page::new(page_size, cell_width));
            }
            col_pages
                .last_mut()
                .expect("page just ensured present")
                .write(value)?;
        }

        match area {
            Area::Base => self.base_count += 1,
            Area::Tail => self.tail_count += 1,
        }
        Ok(rid)
    }

    pub fn get(&self, area: Area, rid: u64, column: usize) -> Result<i64> {
        if rid >= self.count(area) {
            return Err(Error::OutOfBounds(format!(
                "rid {rid} out of bounds for area with {} records",
                self.count(area)
            )));
        }
        if column >= self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "column {column} out of bounds ({} columns)",
                self.num_columns
            )));
        }
        let (page_idx, slot) = self.locate(rid);
        self.area_pages(area)[column][page_idx].read(slot)
    }

    /// Overwrite a cell in place. Intended for meta columns on update/delete.
    pub fn set(&mut self, area: Area, rid: u64, column: usize, value: i64) -> Result<()> {
        if rid >= self.count(area) {
            return Err(Error::OutOfBounds(format!(
                "rid {rid} out of bounds for area with {} records",
                self.count(area)
            )));
        }
        if column >= self.num_columns {
            return Err(Error::OutOfBounds(format!(
                "column {column} out of bounds ({} columns)",
                self.num_columns
            )));
        }
        let (page_idx, slot) = self.locate(rid);
        self.area_pages_mut(area)[column][page_idx].write_at(slot, value)
    }

    /// Walk the indirection chain starting at `base_rid` to the tail
    /// version `v` steps older than the newest (`v <= 0`). Returns the base
    /// row itself if there is no tail chain, or if the chain is shorter
    /// than `|v|`.
    pub fn resolve_version(&self, base_rid: u64, v: i64) -> Result<(Area, u64)> {
        debug_assert!(v <= 0);
        let head = self.get(Area::Base, base_rid, INDIRECTION_COLUMN)?;
        if head == NULL_SENTINEL {
            return Ok((Area::Base, base_rid));
        }

        let mut cur = head as u64;
        let mut step: i64 = 0;
        loop {
            if step <= v {
                break;
            }
            let prev = self.get(Area::Tail, cur, INDIRECTION_COLUMN)?;
            if prev == NULL_SENTINEL {
                break;
            }
            cur = prev as u64;
            step -= 1;
        }

        if step == v {
            Ok((Area::Tail, cur))
        } else {
            Ok((Area::Base, base_rid))
        }
    }

    /// Yield `(rid, value)` for every *live* row in `column`/`area`, in RID
    /// order, skipping base rows tombstoned via `RID_COLUMN == -1`. Used by
    /// `create_index` and as the linear-scan fallback for unindexed
    /// columns.
    pub fn column_values(&self, area: Area, column: usize) -> Result<Vec<(u64, i64)>> {
        let mut out = Vec::with_capacity(self.count(area) as usize);
        for rid in 0..self.count(area) {
            if area == Area::Base && self.get(Area::Base, rid, RID_COLUMN)? == NULL_SENTINEL {
                continue;
            }
            out.push((rid, self.get(area, rid, column)?));
        }
        Ok(out)
    }
}
