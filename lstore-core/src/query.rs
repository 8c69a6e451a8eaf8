//! Thin façade over `Table` that reports failure as `false`/`None` instead
//! of `Result`, for callers that prefer that style over `?`.

use crate::table::Table;

pub struct Query<'a> {
    table: &'a mut Table,
}

impl<'a> Query<'a> {
    pub fn new(table: &'a mut Table) -> Self {
        Self { table }
    }

    pub fn insert(&mut self, values: &[i64]) -> bool {
        self.table.insert(values).is_ok()
    }

    pub fn delete(&mut self, key: i64) -> bool {
        self.table.delete(key).is_ok()
    }

    pub fn update(&mut self, key: i64, new_values: &[Option<i64>]) -> bool {
        self.table.update(key, new_values).is_ok()
    }

    pub fn select_version(&mut self, key: i64, version: i64) -> Option<Vec<i64>> {
        self.table.select_version(key, version).ok()
    }

    pub fn sum_version(&mut self, start_key: i64, end_key: i64, column: usize, version: i64) -> Option<i64> {
        self.table.sum_version(start_key, end_key, column, version).ok()
    }

    pub fn increment(&mut self, key: i64, column: usize) -> bool {
        self.table.increment(key, column).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn failures_surface_as_falsy_values() {
        let mut table = Table::new("t", 2, 0, StoreConfig::default()).unwrap();
        let mut q = Query::new(&mut table);
        assert!(q.insert(&[1, 10]));
        assert!(!q.insert(&[1, 11])); // duplicate key
        assert_eq!(q.select_version(1, 0), Some(vec![1, 10]));
        assert_eq!(q.select_version(99, 0), None);
        assert!(q.update(1, &[None, Some(20)]));
        assert!(q.delete(1));
        assert!(!q.delete(1));
    }
}
