//! Core data models used throughout ragchat.
//!
//! These types represent the document sections, stored chunks, and chat
//! turns that flow through the upload and question-answering pipelines.

use std::fmt;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Lowercase form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalized form used when formatting history for the LLM prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a session's conversation log.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub message: String,
    pub turn_number: i64,
    pub timestamp: i64,
}

/// A logical unit of extracted text (a PDF page, a spreadsheet sheet, or a
/// whole file for unpaginated formats) plus its provenance.
#[derive(Debug, Clone)]
pub struct DocumentSection {
    pub text: String,
    pub source: String,
    pub file_type: String,
    /// Page or sheet number when the format has intrinsic pagination.
    pub page: Option<i64>,
}

/// A chunk ready to be written to the knowledge store: text, provenance,
/// owning session, and its embedding vector.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub session_id: String,
    pub source: String,
    pub file_type: String,
    pub page: Option<i64>,
    pub text: String,
    pub upload_timestamp: i64,
    pub embedding: Vec<f32>,
}

/// A search hit returned by the knowledge store, best match first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_db_form() {
        assert_eq!(Role::parse(Role::User.as_str()), Some(Role::User));
        assert_eq!(Role::parse(Role::Assistant.as_str()), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn role_labels_are_capitalized() {
        assert_eq!(Role::User.label(), "User");
        assert_eq!(Role::Assistant.label(), "Assistant");
    }
}
