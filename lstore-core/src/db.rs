//! Table registry: the top-level handle a caller opens to create, drop,
//! and look up tables.

use std::collections::HashMap;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::table::Table;

pub struct Database {
    cfg: StoreConfig,
    tables: HashMap<String, Table>,
}

impl Database {
    pub fn new(cfg: StoreConfig) -> Self {
        Self {
            cfg,
            tables: HashMap::new(),
        }
    }

    pub fn create_table(&mut self, name: &str, num_columns: usize, primary_key: usize) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        let table = Table::new(name, num_columns, primary_key, self.cfg.clone())?;
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("table '{name}' not found")))
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("table '{name}' not found")))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("table '{name}' not found")))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_drop_round_trip() {
        let mut db = Database::new(StoreConfig::default());
        db.create_table("grades", 3, 0).unwrap();
        assert!(db.get_table("grades").is_ok());

        db.get_table_mut("grades").unwrap().insert(&[1, 2, 3]).unwrap();
        assert_eq!(
            db.get_table_mut("grades").unwrap().select_version(1, 0).unwrap(),
            vec![1, 2, 3]
        );

        db.drop_table("grades").unwrap();
        assert!(matches!(db.get_table("grades"), Err(Error::NotFound(_))));
    }

    #[test]
    fn duplicate_table_name_is_rejected() {
        let mut db = Database::new(StoreConfig::default());
        db.create_table("t", 2, 0).unwrap();
        assert_eq!(db.create_table("t", 2, 0), Err(Error::DuplicateName("t".to_string())));
    }

    #[test]
    fn dropping_unknown_table_is_not_found() {
        let mut db = Database::new(StoreConfig::default());
        assert!(matches!(db.drop_table("ghost"), Err(Error::NotFound(_))));
    }
}
