//! Document entity and its processing lifecycle

use sea_orm::entity::prelude::*;
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};

/// Storage locator for documents created without a file
pub const METADATA_ONLY_LOCATOR: &str = "MANUAL_METADATA_ONLY";

/// Declared file type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    #[sea_orm(string_value = "PDF")]
    Pdf,
    #[sea_orm(string_value = "MARKDOWN")]
    Markdown,
    #[sea_orm(string_value = "TEXT")]
    Text,
    #[sea_orm(string_value = "CODE")]
    Code,
    #[sea_orm(string_value = "DOCX")]
    Docx,
}

impl DocumentType {
    /// Map an upload MIME type to a document type
    pub fn from_mime(mime: &str) -> Option<Self> {
        // Ignore parameters such as "; charset=utf-8"
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(DocumentType::Pdf),
            "text/plain" => Some(DocumentType::Text),
            "text/markdown" => Some(DocumentType::Markdown),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentType::Docx)
            }
            _ => None,
        }
    }
}

/// Processing status
///
/// ```text
/// PENDING -> EXTRACTING -> CHUNKING -> INDEXED
///               |             |
///               +-> FAILED <--+
/// any non-archived state -> ARCHIVED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "EXTRACTING")]
    Extracting,
    #[sea_orm(string_value = "CHUNKING")]
    Chunking,
    #[sea_orm(string_value = "INDEXED")]
    Indexed,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

impl DocumentStatus {
    /// Whether moving from `self` to `next` is a legal lifecycle step
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (Archived, _) => false,
            (_, Archived) => true,
            (Pending, Extracting) => true,
            (Extracting, Chunking) | (Extracting, Failed) => true,
            (Chunking, Indexed) | (Chunking, Failed) => true,
            _ => false,
        }
    }

    /// Every status from which `self` may be entered
    pub fn predecessors(self) -> Vec<DocumentStatus> {
        DocumentStatus::iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }

    /// Terminal states for the processor
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Indexed | DocumentStatus::Failed | DocumentStatus::Archived)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Extracting => "EXTRACTING",
            DocumentStatus::Chunking => "CHUNKING",
            DocumentStatus::Indexed => "INDEXED",
            DocumentStatus::Failed => "FAILED",
            DocumentStatus::Archived => "ARCHIVED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub original_filename: String,

    pub file_type: DocumentType,

    /// Basename under the upload directory, or the metadata-only sentinel
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub storage_path: String,

    pub file_size_bytes: i64,

    pub status: DocumentStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,

    /// Related learning videos as a JSON array
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub related_videos: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    pub indexed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(has_many = "super::document_tag::Entity")]
    DocumentTags,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::document_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use DocumentStatus::*;

    #[test]
    fn test_forward_lifecycle() {
        assert!(Pending.can_transition_to(Extracting));
        assert!(Extracting.can_transition_to(Chunking));
        assert!(Chunking.can_transition_to(Indexed));
    }

    #[test]
    fn test_failure_edges() {
        assert!(Extracting.can_transition_to(Failed));
        assert!(Chunking.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Indexed.can_transition_to(Failed));
    }

    #[test]
    fn test_no_skipping_or_reversal() {
        assert!(!Pending.can_transition_to(Indexed));
        assert!(!Pending.can_transition_to(Chunking));
        assert!(!Indexed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Extracting));
        assert!(!Chunking.can_transition_to(Chunking));
    }

    #[test]
    fn test_archive_edges() {
        for status in [Pending, Extracting, Chunking, Indexed, Failed] {
            assert!(status.can_transition_to(Archived), "{:?}", status);
        }
        assert!(!Archived.can_transition_to(Archived));
        assert!(!Archived.can_transition_to(Pending));
    }

    #[test]
    fn test_predecessors_follow_transitions() {
        assert_eq!(Extracting.predecessors(), vec![Pending]);
        assert_eq!(Indexed.predecessors(), vec![Chunking]);
        assert_eq!(Failed.predecessors(), vec![Extracting, Chunking]);
        assert_eq!(Archived.predecessors(), vec![Pending, Extracting, Chunking, Indexed, Failed]);
        assert!(Pending.predecessors().is_empty());
    }

    #[test]
    fn test_mime_mapping() {
        assert_eq!(DocumentType::from_mime("application/pdf"), Some(DocumentType::Pdf));
        assert_eq!(
            DocumentType::from_mime("text/plain; charset=utf-8"),
            Some(DocumentType::Text)
        );
        assert_eq!(DocumentType::from_mime("text/markdown"), Some(DocumentType::Markdown));
        assert_eq!(DocumentType::from_mime("image/png"), None);
    }

    #[test]
    fn test_status_wire_form() {
        let json = serde_json::to_string(&Indexed).unwrap();
        assert_eq!(json, "\"INDEXED\"");
        let parsed: DocumentStatus = serde_json::from_str("\"ARCHIVED\"").unwrap();
        assert_eq!(parsed, Archived);
    }
}
