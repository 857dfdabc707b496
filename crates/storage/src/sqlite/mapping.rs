use chrono::{DateTime, Utc};
use quiz_core::model::{
    ActiveSession, Attempt, AttemptId, Bookmark, Question, QuestionId, SessionMode,
};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn parse_mode(s: &str) -> Result<SessionMode, StorageError> {
    match s {
        "Practice" => Ok(SessionMode::Practice),
        "Mock" => Ok(SessionMode::Mock),
        _ => Err(StorageError::Serialization(format!("invalid mode: {s}"))),
    }
}

/// List-valued fields are stored as JSON text columns.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(
    field: &'static str,
    raw: &str,
) -> Result<T, StorageError> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("invalid {field}: {e}")))
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options: String = row.try_get("options").map_err(ser)?;
    Question::from_persisted(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get("chapter").map_err(ser)?,
        row.try_get("text").map_err(ser)?,
        from_json("options", &options)?,
        i64_to_u32(
            "correct_index",
            row.try_get::<i64, _>("correct_index").map_err(ser)?,
        )?,
        row.try_get("explanation").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let completed_at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    let question_ids: String = row.try_get("question_ids").map_err(ser)?;
    let answers: String = row.try_get("answers").map_err(ser)?;

    Attempt::from_persisted(
        Some(attempt_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?),
        completed_at,
        row.try_get("chapter").map_err(ser)?,
        i64_to_u32("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        i64_to_u32("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
        parse_mode(&mode)?,
        from_json("question_ids", &question_ids)?,
        from_json("answers", &answers)?,
    )
    .map_err(ser)
}

pub(crate) fn map_bookmark_row(row: &sqlx::sqlite::SqliteRow) -> Result<Bookmark, StorageError> {
    Ok(Bookmark::new(
        question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
    ))
}

pub(crate) fn map_active_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ActiveSession, StorageError> {
    let mode: String = row.try_get("mode").map_err(ser)?;
    let question_ids: String = row.try_get("question_ids").map_err(ser)?;
    let answers: String = row.try_get("answers").map_err(ser)?;
    let current_idx: i64 = row.try_get("current_idx").map_err(ser)?;
    let current_idx = usize::try_from(current_idx)
        .map_err(|_| StorageError::Serialization(format!("invalid current_idx: {current_idx}")))?;

    ActiveSession::from_persisted(
        parse_mode(&mode)?,
        row.try_get("chapter").map_err(ser)?,
        from_json("question_ids", &question_ids)?,
        current_idx,
        from_json("answers", &answers)?,
        row.try_get("started_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_encoding_matches_check_constraint() {
        for mode in [SessionMode::Practice, SessionMode::Mock] {
            assert_eq!(parse_mode(mode.as_str()).unwrap(), mode);
        }
        assert!(parse_mode("practice").is_err());
    }

    #[test]
    fn answers_round_trip_through_json_with_nulls() {
        let answers = vec![Some(0_u32), None, Some(3)];
        let raw = to_json(&answers).unwrap();
        assert_eq!(raw, "[0,null,3]");
        let back: Vec<Option<u32>> = from_json("answers", &raw).unwrap();
        assert_eq!(back, answers);
    }
}
