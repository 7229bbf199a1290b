//! Schema catalog data models.
//!
//! These types describe the tables the agent may query. They are grounding
//! context for the query synthesizer, not an introspection of the live store.

use serde::{Deserialize, Serialize};

/// Semantic type of a column, independent of the store's physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Uuid,
    /// Short free text (names, titles, sectors)
    Text,
    /// Large free-text content such as meeting notes
    LongText,
    Timestamp,
    Integer,
    Boolean,
    /// Comma-separated aggregate of related names (view columns)
    TextList,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "UUID",
            Self::Text => "TEXT",
            Self::LongText => "TEXT (long)",
            Self::Timestamp => "TIMESTAMP",
            Self::Integer => "INTEGER",
            Self::Boolean => "BOOLEAN",
            Self::TextList => "TEXT (comma-separated list)",
        }
    }
}

/// Preferred predicate style for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStyle {
    /// `ILIKE '%term%'` on PostgreSQL, `LIKE '%term%'` on SQLite
    CaseInsensitivePartial,
    Exact,
    /// Only search this column when the user explicitly asks for it
    AvoidFullText,
}

impl MatchStyle {
    /// Instruction rendered into the grounding context.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::CaseInsensitivePartial => {
                "match with a case-insensitive partial match, never exact equality"
            }
            Self::Exact => "match with exact equality",
            Self::AvoidFullText => {
                "do not keyword-search this column unless the user explicitly asks to search the content"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    #[default]
    Table,
    View,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_style: Option<MatchStyle>,
    /// Internal identifier that must never be presented to users
    #[serde(default)]
    pub hidden: bool,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        semantic_type: SemanticType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            description: description.into(),
            match_style: None,
            hidden: false,
        }
    }

    pub fn with_match_style(mut self, match_style: MatchStyle) -> Self {
        self.match_style = Some(match_style);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Description of one table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: RelationKind,
    pub description: String,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub usage_notes: Vec<String>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Table,
            description: description.into(),
            columns: Vec::new(),
            usage_notes: Vec::new(),
        }
    }

    pub fn view(mut self) -> Self {
        self.kind = RelationKind::View;
        self
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.usage_notes.push(note.into());
        self
    }

    /// Look up a column by name (case-insensitive).
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
