use chrono::Duration;
use quiz_core::model::{
    AnswerRecord, Difficulty, Domain, QuestionId, QuizMode, QuizSession, Recommendation,
    RecommendationResult, SessionId, StudyEstimate, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{RecommendationRepository, SessionRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn finalized(user: &str, offset_minutes: i64, answers: &[(u64, &str, bool)]) -> QuizSession {
    let start = fixed_now() + Duration::minutes(offset_minutes);
    let mut session = QuizSession::start(
        SessionId::generate(),
        UserId::new(user).unwrap(),
        QuizMode::Quick,
        10,
        start,
    )
    .unwrap();
    for (i, (id, domain, correct)) in answers.iter().enumerate() {
        let step = i64::try_from(i).unwrap();
        session
            .record(AnswerRecord {
                question_id: QuestionId::new(*id),
                domain: Domain::new(*domain).unwrap(),
                difficulty: Difficulty::Intermediate,
                answer: if *correct { "a".into() } else { "c".into() },
                correct: *correct,
                time_taken: Duration::seconds(3),
                answered_at: start + Duration::seconds(3 * (step + 1)),
            })
            .unwrap();
    }
    session.finalize(start + Duration::minutes(5)).unwrap();
    session
}

fn ten_question_session() -> QuizSession {
    finalized(
        "learner",
        0,
        &[
            (1, "transformers", true),
            (2, "gans", false),
            (3, "transformers", true),
            (4, "gans", true),
            (5, "transformers", false),
            (6, "gans", false),
            (7, "transformers", true),
            (8, "gans", true),
            (9, "transformers", false),
            (10, "gans", false),
        ],
    )
}

#[tokio::test]
async fn persisted_session_reloads_with_identical_scores() {
    let repo = connect("memdb_reload_scores").await;
    let session = ten_question_session();
    repo.append_session(&session).await.unwrap();

    let reloaded = repo.get_session(session.id()).await.unwrap();
    assert_eq!(reloaded, session);

    let result = repo.get_result(session.id()).await.unwrap();
    assert_eq!(result.total_questions(), 10);
    assert_eq!(result.correct_answers(), 5);
    let transformers = result
        .record_for(&Domain::new("transformers").unwrap())
        .unwrap();
    let gans = result.record_for(&Domain::new("gans").unwrap()).unwrap();
    assert_eq!((transformers.correct(), transformers.total()), (3, 5));
    assert_eq!((gans.correct(), gans.total()), (2, 5));
    assert!((transformers.percentage() - 60.0).abs() < 1e-9);
    assert!((gans.percentage() - 40.0).abs() < 1e-9);

    let history = repo
        .list_history(&UserId::new("learner").unwrap(), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], result);
}

#[tokio::test]
async fn sessions_are_append_only() {
    let repo = connect("memdb_append_only").await;
    let session = finalized("learner", 0, &[(1, "pytorch", true)]);
    repo.append_session(&session).await.unwrap();

    let err = repo.append_session(&session).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // The failed write must not leave partial rows behind.
    let reloaded = repo.get_session(session.id()).await.unwrap();
    assert_eq!(reloaded.answers().len(), 1);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let repo = connect("memdb_not_found").await;
    let err = repo.get_result(SessionId::generate()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let repo = connect("memdb_history_order").await;
    let first = finalized("learner", 0, &[(1, "gans", false)]);
    let second = finalized("learner", 30, &[(1, "gans", true)]);
    let third = finalized("learner", 60, &[(2, "gans", true)]);
    let stranger = finalized("stranger", 90, &[(1, "gans", true)]);
    for session in [&second, &first, &third, &stranger] {
        repo.append_session(session).await.unwrap();
    }

    let user = UserId::new("learner").unwrap();
    let history = repo.list_history(&user, 10).await.unwrap();
    let ids: Vec<SessionId> = history.iter().map(|r| r.session_id()).collect();
    assert_eq!(ids, vec![third.id(), second.id(), first.id()]);

    let limited = repo.list_history(&user, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].session_id(), third.id());
}

#[tokio::test]
async fn recommendations_are_replaced_per_session() {
    let repo = connect("memdb_recommendations").await;
    let session = ten_question_session();
    repo.append_session(&session).await.unwrap();

    let item = |rank, domain: &str, pct, advice: Option<&str>| Recommendation {
        rank,
        domain: Domain::new(domain).unwrap(),
        accuracy_pct: pct,
        rationale: format!("{domain} needs work"),
        resources: vec!["Book".into(), "Course".into()],
        estimate: StudyEstimate::OneToTwoWeeks,
        advice: advice.map(str::to_owned),
    };

    let first = RecommendationResult::new(
        session.id(),
        fixed_now(),
        vec![
            item(2, "transformers", 60.0, None),
            item(1, "gans", 40.0, Some("Practice the minimax game.")),
        ],
    )
    .unwrap();
    repo.replace_recommendations(&first).await.unwrap();
    let fetched = repo.get_recommendations(session.id()).await.unwrap();
    assert_eq!(fetched, Some(first));

    let second = RecommendationResult::new(
        session.id(),
        fixed_now() + Duration::hours(1),
        vec![item(1, "gans", 40.0, None)],
    )
    .unwrap();
    repo.replace_recommendations(&second).await.unwrap();
    let fetched = repo.get_recommendations(session.id()).await.unwrap().unwrap();
    assert_eq!(fetched.items().len(), 1);
    assert_eq!(fetched, second);
}

#[tokio::test]
async fn recommendations_for_unknown_session_are_rejected() {
    let repo = connect("memdb_recommendations_orphan").await;
    let orphan = RecommendationResult::new(SessionId::generate(), fixed_now(), Vec::new()).unwrap();
    let err = repo.replace_recommendations(&orphan).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn storage_facade_wires_sqlite_handles() {
    let storage = Storage::sqlite("sqlite:file:memdb_facade?mode=memory&cache=shared")
        .await
        .unwrap();
    let session = finalized("learner", 0, &[(4, "ml_basics", true)]);
    storage.sessions.append_session(&session).await.unwrap();
    let result = storage.sessions.get_result(session.id()).await.unwrap();
    assert_eq!(result.correct_answers(), 1);
    assert!(
        storage
            .recommendations
            .get_recommendations(session.id())
            .await
            .unwrap()
            .is_none()
    );
}
