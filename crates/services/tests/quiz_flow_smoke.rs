use std::fmt::Write as _;
use std::sync::Arc;

use quiz_core::model::{AdviceSettings, Domain, QuizLimits, QuizMode, UserId};
use quiz_core::time::fixed_now;
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::{AppServices, Clock};
use storage::question_bank::QuestionBank;

/// Five transformers questions (ids 1-5) and five GAN questions (ids 6-10).
fn bank(demo: &[u64]) -> Arc<QuestionBank> {
    let mut questions = String::new();
    for id in 1..=10 {
        let area = if id <= 5 { "transformers" } else { "gans" };
        if id > 1 {
            questions.push(',');
        }
        write!(
            questions,
            r#"{{"id": {id}, "question_text": "Q{id}", "options": {{"A": "yes", "B": "no"}},
                "correct_answer": "A", "knowledge_area": "{area}",
                "difficulty_level": "intermediate", "explanation": "E{id}"}}"#
        )
        .unwrap();
    }
    let demo = demo
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let raw = format!(r#"{{"questions": [{questions}], "demo_questions": [{demo}]}}"#);
    Arc::new(QuestionBank::from_json_str(&raw).unwrap())
}

/// Transformers 1-3 and GANs 6-7 answered correctly: 3/5 and 2/5.
fn answer_for(id: u64) -> &'static str {
    if matches!(id, 1..=3 | 6 | 7) { "A" } else { "b" }
}

#[tokio::test]
async fn quick_quiz_ranks_weakest_domain_first_and_keeps_history() {
    let demo: Vec<u64> = (1..=10).collect();
    let services = AppServices::in_memory(
        bank(&demo),
        QuizLimits::default(),
        &AdviceSettings::disabled(),
        Clock::fixed(fixed_now()),
    );
    let quiz_loop = services.quiz_loop();
    let user = UserId::new("learner").unwrap();

    let mut quiz = quiz_loop
        .start_quiz_with_rng(user.clone(), QuizMode::Quick, StdRng::seed_from_u64(7))
        .unwrap();
    while let Some(question) = quiz_loop.next_question(&mut quiz) {
        let answer = answer_for(question.id().value());
        quiz_loop.answer_current(&mut quiz, answer).unwrap();
    }
    assert_eq!(quiz.progress().answered, 10);

    let result = quiz_loop.finish(&mut quiz).await.unwrap();
    let transformers = Domain::new("transformers").unwrap();
    let gans = Domain::new("gans").unwrap();
    assert!((result.record_for(&transformers).unwrap().percentage() - 60.0).abs() < 1e-9);
    assert!((result.record_for(&gans).unwrap().percentage() - 40.0).abs() < 1e-9);

    let (recommendations, save_error) = services
        .recommendations()
        .generate_and_save(&result)
        .await
        .unwrap();
    assert!(save_error.is_none());
    assert_eq!(recommendations.ranked_domains(), vec![&gans, &transformers]);
    assert!(recommendations.items().iter().all(|item| item.advice.is_none()));

    let stored = services
        .recommendations()
        .stored(result.session_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.ranked_domains(), vec![&gans, &transformers]);

    let history = services.history().recent(&user, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].session_id(), result.session_id());
    assert_eq!(history[0].records(), result.records());

    let reloaded = services.history().result(result.session_id()).await.unwrap();
    assert_eq!(reloaded.mode(), QuizMode::Quick);
    assert_eq!(reloaded.records(), result.records());
}

#[tokio::test]
async fn quick_quiz_draws_only_from_demo_pool() {
    let services = AppServices::in_memory(
        bank(&[1, 6]),
        QuizLimits::default(),
        &AdviceSettings::disabled(),
        Clock::fixed(fixed_now()),
    );
    let quiz_loop = services.quiz_loop();

    let mut quiz = quiz_loop
        .start_quiz(UserId::new("visitor").unwrap(), QuizMode::Quick)
        .unwrap();
    let mut served = Vec::new();
    while let Some(question) = quiz_loop.next_question(&mut quiz) {
        served.push(question.id().value());
        quiz_loop.answer_current(&mut quiz, "A").unwrap();
    }
    served.sort_unstable();
    assert_eq!(served, vec![1, 6]);

    let result = quiz_loop.finish(&mut quiz).await.unwrap();
    assert_eq!(result.correct_answers(), 2);
}
