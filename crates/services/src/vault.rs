use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use quiz_core::model::{Question, QuestionDraft, QuestionId, ValidatedQuestion};

use storage::repository::QuestionRepository;

use crate::Clock;
use crate::error::ImportError;

/// Text stored for imported questions that arrive without any.
pub const MISSING_TEXT: &str = "Missing text";

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

/// Question-shaped record as found in import files. Every field is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRecord {
    chapter: Option<String>,
    text: Option<String>,
    options: Option<Vec<String>>,
    correct_index: Option<u32>,
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Many(Vec<ImportRecord>),
    One(ImportRecord),
}

impl ImportDocument {
    fn into_records(self) -> Vec<ImportRecord> {
        match self {
            ImportDocument::Many(records) => records,
            ImportDocument::One(record) => vec![record],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRecord<'a> {
    id: QuestionId,
    chapter: &'a str,
    text: &'a str,
    options: &'a [String],
    correct_index: u32,
    explanation: &'a str,
}

impl<'a> From<&'a Question> for ExportRecord<'a> {
    fn from(q: &'a Question) -> Self {
        Self {
            id: q.id(),
            chapter: q.chapter(),
            text: q.text(),
            options: q.options(),
            correct_index: q.correct_index(),
            explanation: q.explanation(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl ImportRecord {
    fn into_draft(self, default_chapter: &str) -> QuestionDraft {
        QuestionDraft {
            chapter: non_empty(self.chapter).unwrap_or_else(|| default_chapter.to_owned()),
            text: non_empty(self.text).unwrap_or_else(|| MISSING_TEXT.to_owned()),
            options: self.options.unwrap_or_default(),
            correct_index: self.correct_index.unwrap_or(0),
            explanation: self.explanation.unwrap_or_default(),
        }
    }
}

/// Chapter used for records without one: the file name minus its extension.
#[must_use]
pub fn default_chapter(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .map_or_else(|| source_name.to_owned(), |s| s.to_string_lossy().into_owned())
}

/// Parse and validate a whole import document without touching storage.
///
/// # Errors
///
/// Returns `ImportError::InvalidFormat` if `json` is not an array or object of
/// question records, or `ImportError::InvalidQuestion` for the first record that fails
/// validation.
pub fn parse_import(source_name: &str, json: &str) -> Result<Vec<ValidatedQuestion>, ImportError> {
    let document: ImportDocument = serde_json::from_str(json).map_err(ImportError::InvalidFormat)?;
    let chapter = default_chapter(source_name);
    document
        .into_records()
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_draft(&chapter)
                .validate()
                .map_err(|source| ImportError::InvalidQuestion { index, source })
        })
        .collect()
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub ids: Vec<QuestionId>,
}

impl ImportReport {
    #[must_use]
    pub fn added(&self) -> usize {
        self.ids.len()
    }
}

/// Moves the question bank in and out of JSON files.
#[derive(Clone)]
pub struct VaultService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
}

impl VaultService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { clock, questions }
    }

    /// Import every record of `json` in one batch. Nothing is stored unless every
    /// record is valid.
    ///
    /// # Errors
    ///
    /// Returns `ImportError` for malformed documents, invalid records or storage failures.
    pub async fn import_json(
        &self,
        source_name: &str,
        json: &str,
    ) -> Result<ImportReport, ImportError> {
        let questions = parse_import(source_name, json)?;
        let ids = self.questions.bulk_add_questions(questions).await?;
        info!(source = source_name, added = ids.len(), "questions imported");
        Ok(ImportReport { ids })
    }

    /// The whole bank as a pretty-printed JSON array.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Storage` if the bank cannot be read.
    pub async fn export_json(&self) -> Result<String, ImportError> {
        let questions = self.questions.list_questions().await?;
        let records: Vec<ExportRecord<'_>> = questions.iter().map(ExportRecord::from).collect();
        let json = serde_json::to_string_pretty(&records).map_err(ImportError::Export)?;
        info!(exported = records.len(), "questions exported");
        Ok(json)
    }

    /// Suggested file name for an export made today.
    #[must_use]
    pub fn export_file_name(&self) -> String {
        format!("radprep_export_{}.json", self.clock.date_stamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionError;
    use quiz_core::time::fixed_clock;
    use storage::repository::Storage;

    fn vault(storage: &Storage) -> VaultService {
        VaultService::new(fixed_clock(), Arc::clone(&storage.questions))
    }

    #[test]
    fn single_object_gets_defaults() {
        let parsed = parse_import(
            "physics_set.json",
            r#"{ "text": "", "options": ["a", "b"], "correctIndex": null }"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        let q = &parsed[0];
        assert_eq!(q.chapter(), "physics_set");
        assert_eq!(q.text(), MISSING_TEXT);
        assert_eq!(q.correct_index(), 0);
        assert_eq!(q.explanation(), "");
    }

    #[test]
    fn invalid_json_is_a_format_error() {
        assert!(matches!(
            parse_import("x.json", "{ not json"),
            Err(ImportError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_import("x.json", "42"),
            Err(ImportError::InvalidFormat(_))
        ));
    }

    #[test]
    fn record_without_options_is_rejected_with_its_index() {
        let err = parse_import(
            "bank.json",
            r#"[{ "text": "ok", "options": ["a"] }, { "text": "no options" }]"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ImportError::InvalidQuestion {
                index: 1,
                source: QuestionError::CorrectIndexOutOfRange { index: 0, options: 0 }
            }
        ));
    }

    #[test]
    fn default_chapter_strips_directory_and_extension() {
        assert_eq!(default_chapter("/tmp/Radiobiology.json"), "Radiobiology");
        assert_eq!(default_chapter("Anatomy"), "Anatomy");
    }

    #[tokio::test]
    async fn missing_correct_index_is_stored_as_zero() {
        let storage = Storage::in_memory();
        let report = vault(&storage)
            .import_json(
                "Physics.json",
                r#"{ "chapter": "Physics", "text": "Unit of dose?", "options": ["Gy", "Sv"] }"#,
            )
            .await
            .unwrap();
        assert_eq!(report.added(), 1);

        let stored = storage.questions.get_question(report.ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.correct_index(), 0);
        assert_eq!(stored.chapter(), "Physics");
    }

    #[tokio::test]
    async fn failed_import_writes_nothing() {
        let storage = Storage::in_memory();
        let err = vault(&storage)
            .import_json(
                "bank.json",
                r#"[{ "text": "fine", "options": ["a", "b"] }, { "options": ["a"], "correctIndex": 4 }]"#,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidQuestion { index: 1, .. }));
        assert_eq!(storage.questions.count_questions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn export_is_pretty_camel_case_with_ids() {
        let storage = Storage::in_memory();
        let vault = vault(&storage);
        vault
            .import_json(
                "Physics.json",
                r#"[{ "text": "Q", "options": ["a", "b"], "correctIndex": 1, "explanation": "why" }]"#,
            )
            .await
            .unwrap();

        let json = vault.export_json().await.unwrap();
        assert!(json.contains("\n  {"));
        assert!(json.contains("\"correctIndex\": 1"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["id"], 1);
        assert_eq!(value[0]["chapter"], "Physics");
        assert_eq!(value[0]["options"][1], "b");

        assert_eq!(vault.export_file_name(), "radprep_export_2023-11-14.json");
    }
}
