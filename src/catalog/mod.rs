//! Schema catalog.
//!
//! The catalog is the static, versioned description of every relation the
//! agent may query. It is loaded once at startup, validated, and then shared
//! read-only between requests. A misconfigured catalog fails the process
//! before any question is accepted.

mod meetings;

use crate::error::CatalogError;
use crate::models::{RelationKind, SchemaDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Version of the built-in meetings catalog.
pub const BUILTIN_CATALOG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub version: u32,
    tables: Vec<SchemaDescriptor>,
}

impl SchemaCatalog {
    /// Create a validated catalog.
    pub fn new(version: u32, tables: Vec<SchemaDescriptor>) -> Result<Self, CatalogError> {
        let catalog = Self { version, tables };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The built-in catalog for the meetings dataset.
    pub fn meetings() -> Self {
        Self {
            version: BUILTIN_CATALOG_VERSION,
            tables: meetings::descriptors(),
        }
    }

    /// Parse and validate a catalog from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check that every descriptor carries its required fields.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.tables.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen_tables = HashSet::new();
        for (index, table) in self.tables.iter().enumerate() {
            let name = table.name.trim();
            if name.is_empty() {
                return Err(CatalogError::EmptyTableName { index });
            }
            if !seen_tables.insert(name.to_lowercase()) {
                return Err(CatalogError::DuplicateTable {
                    table: name.to_string(),
                });
            }
            if table.description.trim().is_empty() {
                return Err(CatalogError::MissingDescription {
                    table: name.to_string(),
                });
            }
            if table.columns.is_empty() {
                return Err(CatalogError::NoColumns {
                    table: name.to_string(),
                });
            }

            let mut seen_columns = HashSet::new();
            for column in &table.columns {
                let column_name = column.name.trim();
                if column_name.is_empty() {
                    return Err(CatalogError::EmptyColumnName {
                        table: name.to_string(),
                    });
                }
                if column.description.trim().is_empty() {
                    return Err(CatalogError::MissingColumnDescription {
                        table: name.to_string(),
                        column: column_name.to_string(),
                    });
                }
                if !seen_columns.insert(column_name.to_lowercase()) {
                    return Err(CatalogError::DuplicateColumn {
                        table: name.to_string(),
                        column: column_name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All relation descriptors, in catalog order.
    pub fn describe(&self) -> &[SchemaDescriptor] {
        &self.tables
    }

    /// Look up a relation by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&SchemaDescriptor> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn contains_relation(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Render the grounding context block used in synthesis prompts.
    pub fn render(&self) -> String {
        let mut out = format!("Schema catalog version {}\n", self.version);
        for table in &self.tables {
            let kind = match table.kind {
                RelationKind::Table => "Table",
                RelationKind::View => "View",
            };
            out.push_str(&format!("\n{} Name: {}\n", kind, table.name));
            out.push_str(&format!("Description: {}\n", table.description));
            out.push_str("Columns:\n");
            for column in &table.columns {
                out.push_str(&format!(
                    "    - {}: {}\n        - {}\n",
                    column.name,
                    column.semantic_type.as_str(),
                    column.description
                ));
                if column.hidden {
                    out.push_str("        - Internal identifier: never present it to the user.\n");
                }
                if let Some(style) = column.match_style {
                    out.push_str(&format!("        - Matching: {}.\n", style.instruction()));
                }
            }
            if !table.usage_notes.is_empty() {
                out.push_str("Usage notes:\n");
                for note in &table.usage_notes {
                    out.push_str(&format!("    - {}\n", note));
                }
            }
        }
        out
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::meetings()
    }
}
