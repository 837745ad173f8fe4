// ABOUTME: Serde data models for Readwise export responses
// ABOUTME: Known fields are typed, everything else passes through to templates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifiers arrive as numbers from the export API but as strings from
/// some older clients; both are rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    pub fn is_empty(&self) -> bool {
        matches!(self, RecordId::Text(s) if s.is_empty())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "user_book_id", alias = "id")]
    pub id: RecordId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: RecordId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportPage {
    #[serde(default)]
    pub results: Vec<Book>,
    #[serde(rename = "nextPageCursor", default)]
    pub next_page_cursor: Option<RecordId>,
}

impl ExportPage {
    /// Cursor for the following page, `None` once pagination is done.
    pub fn next_cursor(&self) -> Option<String> {
        self.next_page_cursor
            .as_ref()
            .filter(|cursor| !cursor.is_empty())
            .map(|cursor| cursor.to_string())
    }
}
