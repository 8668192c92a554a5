//! Catalog data model.

use serde::{Deserialize, Serialize};
use sluice_ids::FileId;
use sqlx::FromRow;

/// Whether a file appeared externally or was produced by a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    Original,
    Derivative,
}

/// Per-(file, processor) lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseStatus {
    Pending,
    PendingApproval,
    Processing,
    Done,
    Failed,
}

impl ParseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStatus::Pending => "PENDING",
            ParseStatus::PendingApproval => "PENDING_APPROVAL",
            ParseStatus::Processing => "PROCESSING",
            ParseStatus::Done => "DONE",
            ParseStatus::Failed => "FAILED",
        }
    }
}

/// One row per observed path. `id` is a stable surrogate key assigned on
/// first insert and never reused.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub kind: FileKind,
    pub created_at: i64,
    pub updated_at: i64,
}

impl File {
    pub fn file_id(&self) -> FileId {
        FileId(self.id)
    }
}

/// The (file, processor) edge — the heart of the state machine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Parse {
    pub file_id: i64,
    pub processor_name: String,
    pub status: ParseStatus,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub approval_batch_id: Option<String>,
    pub updated_at: i64,
}

/// A named, enabled/disabled binding of a processor implementation to a
/// filter and policy. JSON array columns (`input_extensions`, `input_tags`,
/// `depends_on`) are decoded lazily by callers via [`ProcessorConfigRow::input_extensions`]
/// and friends, since `sqlx::FromRow` has no first-class JSON-array column support
/// for SQLite `TEXT` columns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProcessorConfigRow {
    pub name: String,
    pub implementation: String,
    pub input_extensions_json: String,
    pub input_tags_json: String,
    pub output_ext: String,
    pub depends_on_json: String,
    pub is_enabled: bool,
    pub allow_user_selection: bool,
    pub allow_derived_files: bool,
    pub config_json: String,
}

impl ProcessorConfigRow {
    pub fn input_extensions(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.input_extensions_json)
    }

    pub fn input_tags(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.input_tags_json)
    }

    pub fn depends_on(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.depends_on_json)
    }

    pub fn config(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.config_json)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileTag {
    pub file_id: i64,
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_id: i64,
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalBatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApprovalBatch {
    pub id: String,
    pub name: String,
    pub status: ApprovalBatchStatus,
    pub estimated_cost: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
