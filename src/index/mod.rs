use anyhow::{Error, Result};

use crate::catalog::schema::Schema;

pub mod builder;
pub mod cursor;
pub mod node;

/// The on-disk name of an index file inside the data directory. The
/// attribute may arrive table qualified; only its final segment is used.
pub fn index_file_name(relation: &str, attribute: &str) -> String {
    let attribute = attribute.rsplit('.').next().unwrap_or(attribute);
    format!("{}.{}", relation, attribute)
}

/// Resolves the indexed attribute to its column position in the base
/// relation schema, accepting both bare and table-qualified names.
pub fn resolve_key_column(schema: &Schema, relation: &str, attribute: &str) -> Result<usize> {
    let bare = attribute.rsplit('.').next().unwrap_or(attribute);
    schema
        .find_column(attribute)
        .or_else(|| schema.find_column(&format!("{}.{}", relation, bare)))
        .ok_or_else(|| {
            Error::msg(format!(
                "Relation {} has no column named {}",
                relation, attribute
            ))
        })
}
