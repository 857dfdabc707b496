use chrono::Duration;
use quiz_core::model::{
    ActiveSession, Attempt, Bookmark, Question, QuestionDraft, QuestionId, SessionMode,
    ValidatedQuestion,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    ActiveSessionRepository, AttemptRepository, BookmarkRepository, QuestionRepository,
    SessionPersistence,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn draft(chapter: &str, text: &str, correct_index: u32) -> ValidatedQuestion {
    QuestionDraft {
        chapter: chapter.into(),
        text: text.into(),
        options: vec!["Gray".into(), "Sievert".into(), "Becquerel".into()],
        correct_index,
        explanation: format!("about {text}"),
    }
    .validate()
    .unwrap()
}

#[tokio::test]
async fn sqlite_questions_bulk_add_get_and_clear() {
    let repo = connect("memdb_questions").await;

    let ids = repo
        .bulk_add_questions(vec![
            draft("Radiation Physics", "absorbed dose", 0),
            draft("Anatomy", "femur", 1),
            draft("Radiation Physics", "activity", 2),
        ])
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(repo.count_questions().await.unwrap(), 3);

    let fetched = repo
        .bulk_get_questions(&[ids[2], QuestionId::new(999), ids[0]])
        .await
        .unwrap();
    assert_eq!(fetched[0].as_ref().unwrap().text(), "activity");
    assert!(fetched[1].is_none());
    assert_eq!(
        fetched[2].as_ref().unwrap().options(),
        &["Gray", "Sievert", "Becquerel"]
    );

    let physics = repo.questions_in_chapter("Radiation Physics").await.unwrap();
    assert_eq!(physics.len(), 2);
    assert!(physics.iter().all(|q| q.chapter() == "Radiation Physics"));

    let femur = repo
        .filter_questions(&|q: &Question| q.text().contains("femur"))
        .await
        .unwrap();
    assert_eq!(femur.len(), 1);

    repo.clear_questions().await.unwrap();
    assert_eq!(repo.count_questions().await.unwrap(), 0);

    let next = repo
        .bulk_add_questions(vec![draft("Anatomy", "tibia", 0)])
        .await
        .unwrap();
    assert!(next[0] > ids[2], "ids are not reused after a clear");
}

#[tokio::test]
async fn sqlite_upsert_and_delete_question() {
    let repo = connect("memdb_upsert").await;
    let ids = repo
        .bulk_add_questions(vec![draft("Anatomy", "femur", 1)])
        .await
        .unwrap();

    let edited = draft("Anatomy", "the femur", 2).assign_id(ids[0]);
    repo.upsert_question(&edited).await.unwrap();
    let stored = repo.get_question(ids[0]).await.unwrap().unwrap();
    assert_eq!(stored, edited);

    repo.delete_question(ids[0]).await.unwrap();
    assert!(repo.get_question(ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_active_session_round_trips_and_stays_singleton() {
    let repo = connect("memdb_active").await;
    assert!(repo.get_active_session().await.unwrap().is_none());

    let ids = vec![QuestionId::new(3), QuestionId::new(1), QuestionId::new(2)];
    let session = ActiveSession::from_persisted(
        SessionMode::Practice,
        Some("Radiation Physics".into()),
        ids.clone(),
        2,
        vec![Some(1), None, Some(0)],
        fixed_now(),
    )
    .unwrap();
    repo.put_active_session(&session).await.unwrap();
    assert_eq!(repo.get_active_session().await.unwrap(), Some(session));

    let replacement = ActiveSession::fresh(SessionMode::Mock, None, ids, fixed_now());
    repo.put_active_session(&replacement).await.unwrap();
    assert_eq!(repo.get_active_session().await.unwrap(), Some(replacement));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM active_sessions")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn sqlite_complete_session_is_atomic_append_and_clear() {
    let repo = connect("memdb_complete").await;
    let ids = repo
        .bulk_add_questions(vec![
            draft("Radiation Physics", "a", 0),
            draft("Radiation Physics", "b", 1),
            draft("Radiation Physics", "c", 1),
        ])
        .await
        .unwrap();
    let questions: Vec<Question> = repo
        .bulk_get_questions(&ids)
        .await
        .unwrap()
        .into_iter()
        .flatten()
        .collect();

    repo.put_active_session(&ActiveSession::fresh(
        SessionMode::Mock,
        Some("Radiation Physics".into()),
        ids.clone(),
        fixed_now(),
    ))
    .await
    .unwrap();

    let attempt = Attempt::grade(
        &questions,
        vec![Some(0), Some(1), None],
        SessionMode::Mock,
        "Radiation Physics".into(),
        fixed_now() + Duration::minutes(10),
    )
    .unwrap();
    let id = repo.complete_session(&attempt).await.unwrap();

    assert!(repo.get_active_session().await.unwrap().is_none());
    let stored = repo.get_attempt(id).await.unwrap().unwrap();
    assert_eq!(stored.score(), 2);
    assert_eq!(stored.total(), 3);
    assert_eq!(stored.answers(), &[Some(0), Some(1), None]);
    assert_eq!(stored.question_ids(), ids.as_slice());
    assert_eq!(stored.mode(), SessionMode::Mock);
}

#[tokio::test]
async fn sqlite_attempts_list_most_recent_first() {
    let repo = connect("memdb_attempts").await;
    let ids = repo
        .bulk_add_questions(vec![draft("Anatomy", "a", 0)])
        .await
        .unwrap();
    let questions: Vec<Question> = repo
        .bulk_get_questions(&ids)
        .await
        .unwrap()
        .into_iter()
        .flatten()
        .collect();

    for minutes in [1, 3, 2] {
        let attempt = Attempt::grade(
            &questions,
            vec![Some(0)],
            SessionMode::Practice,
            "Anatomy".into(),
            fixed_now() + Duration::minutes(minutes),
        )
        .unwrap();
        repo.append_attempt(&attempt).await.unwrap();
    }

    let all = repo.list_attempts().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].completed_at(), fixed_now() + Duration::minutes(3));
    assert_eq!(all[2].completed_at(), fixed_now() + Duration::minutes(1));

    let recent = repo.recent_attempts(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(repo.count_attempts().await.unwrap(), 3);
}

#[tokio::test]
async fn sqlite_bookmarks_are_keyed_by_question() {
    let repo = connect("memdb_bookmarks").await;
    let q = QuestionId::new(4);

    repo.put_bookmark(&Bookmark::new(q, fixed_now())).await.unwrap();
    repo.put_bookmark(&Bookmark::new(q, fixed_now() + Duration::seconds(1)))
        .await
        .unwrap();
    assert_eq!(repo.count_bookmarks().await.unwrap(), 1);
    assert_eq!(
        repo.get_bookmark(q).await.unwrap().unwrap().created_at,
        fixed_now() + Duration::seconds(1)
    );

    repo.delete_bookmark(q).await.unwrap();
    assert!(repo.list_bookmarks().await.unwrap().is_empty());
}
