use std::fs;
use std::path::Path;

use anyhow::{Context, Error, Result};
use dashmap::DashMap;

use crate::common::SCHEMA_FILE_NAME;
use crate::catalog::schema::Schema;

pub mod schema;

/// Table name to schema lookup for one data directory. Constructed once
/// and passed by reference into whatever needs it; there is no global
/// catalog state.
pub struct Catalog {
    tables: DashMap<String, Schema>,
}

impl Catalog {
    /// Loads the catalog from the schema file inside the data directory.
    /// Each line names a table followed by its column names:
    /// `Sailors A B C`. Column names are stored table qualified.
    pub fn load(data_directory: &Path) -> Result<Self> {
        let path = data_directory.join(SCHEMA_FILE_NAME);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read schema file {}", path.display()))?;

        let catalog = Self {
            tables: DashMap::new(),
        };

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let table = match parts.next() {
                Some(table) => table,
                None => continue,
            };
            let columns = parts.collect::<Vec<&str>>();
            if columns.is_empty() {
                return Err(Error::msg(format!(
                    "Table {} in schema file {} has no columns",
                    table,
                    path.display()
                )));
            }
            catalog.register_table(table, &columns);
        }

        Ok(catalog)
    }

    pub fn register_table(&self, table: &str, columns: &[&str]) {
        self.tables
            .insert(table.to_owned(), Schema::qualified(table, columns));
    }

    pub fn get_schema(&self, table: &str) -> Option<Schema> {
        self.tables.get(table).map(|schema| schema.value().clone())
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut tables = self
            .tables
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<String>>();
        tables.sort();
        tables
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::Catalog;
    use crate::common::SCHEMA_FILE_NAME;

    #[test]
    fn loads_schema_file() -> Result<()> {
        let data_dir = tempdir()?;
        fs::write(
            data_dir.path().join(SCHEMA_FILE_NAME),
            "Sailors A B C\nBoats D E\n",
        )?;

        let catalog = Catalog::load(data_dir.path())?;
        assert_eq!(catalog.list_tables(), vec!["Boats", "Sailors"]);

        let schema = catalog.get_schema("Sailors").unwrap();
        assert_eq!(schema.arity(), 3);
        assert_eq!(schema.find_column("Sailors.C"), Some(2));

        assert!(catalog.get_schema("Reserves").is_none());
        Ok(())
    }

    #[test]
    fn rejects_tables_without_columns() -> Result<()> {
        let data_dir = tempdir()?;
        fs::write(data_dir.path().join(SCHEMA_FILE_NAME), "Sailors\n")?;

        assert!(Catalog::load(data_dir.path()).is_err());
        Ok(())
    }
}
