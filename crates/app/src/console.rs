//! Terminal front end: prompts on stdout, answers from stdin.

use std::io::Write as _;

use quiz_core::model::{QuizMode, Recommendation, SessionId, SessionResult, UserId};
use services::quiz::{ActiveQuiz, AnswerFeedback, QuizLoopService, QuizProgress};
use services::{AppServices, QuizError};
use storage::question_bank::QuestionBank;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `text` and read one trimmed line; `None` on end of input.
    async fn ask(&mut self, text: &str) -> AppResult<Option<String>> {
        print!("{text}");
        std::io::stdout().flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    async fn confirm(&mut self, text: &str) -> AppResult<bool> {
        let answer = self.ask(text).await?.unwrap_or_default();
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    pub async fn run_quiz(
        &mut self,
        services: &AppServices,
        user_id: UserId,
        mode: QuizMode,
    ) -> AppResult<()> {
        let quiz_loop = services.quiz_loop();
        let mut quiz = quiz_loop.start_quiz(user_id, mode)?;
        println!(
            "Starting a {mode} quiz of up to {} questions. Type an option key, or 'quit' to stop early.",
            quiz.progress().limit
        );

        self.ask_questions(&quiz_loop, &mut quiz).await?;

        if quiz.progress().answered == 0 {
            println!("No answers recorded; nothing was saved.");
            return Ok(());
        }

        let (result, saved) = self.finish(&quiz_loop, &mut quiz).await?;
        print_result(&result);

        let recommendations = services.recommendations();
        let generated = if saved {
            let (generated, save_error) = recommendations.generate_and_save(&result).await?;
            if let Some(e) = save_error {
                eprintln!("Recommendations could not be saved: {e}");
            }
            generated
        } else {
            recommendations.generate(&result).await?
        };
        print_recommendations(generated.items());
        Ok(())
    }

    async fn ask_questions(
        &mut self,
        quiz_loop: &QuizLoopService,
        quiz: &mut ActiveQuiz,
    ) -> AppResult<()> {
        loop {
            let progress = quiz.progress();
            let Some(question) = quiz_loop.next_question(quiz) else {
                return Ok(());
            };
            let keys: Vec<String> = question.options().keys().cloned().collect();
            println!();
            println!(
                "Question {} of {} [{} · {}]",
                progress.answered + 1,
                progress.limit,
                question.domain().label(),
                question.difficulty()
            );
            println!("{}", question.prompt());
            for (key, text) in question.options() {
                println!("  {key}) {text}");
            }

            loop {
                let Some(answer) = self.ask("Your answer: ").await? else {
                    return Ok(());
                };
                let lower = answer.to_lowercase();
                if matches!(lower.as_str(), "q" | "quit") && !keys.contains(&lower) {
                    return Ok(());
                }
                if answer.is_empty() {
                    continue;
                }
                match quiz_loop.answer_current(quiz, &answer) {
                    Ok(feedback) => {
                        print_feedback(&feedback);
                        break;
                    }
                    Err(QuizError::UnknownOption { .. }) => {
                        println!("Please answer with one of: {}", keys.join(", "));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    /// Finalize and persist, offering retries when the write fails.
    ///
    /// Returns the result and whether it was stored.
    async fn finish(
        &mut self,
        quiz_loop: &QuizLoopService,
        quiz: &mut ActiveQuiz,
    ) -> AppResult<(SessionResult, bool)> {
        let mut outcome = quiz_loop.finish(quiz).await;
        loop {
            match outcome {
                Ok(result) => return Ok((result, true)),
                Err(QuizError::Storage(e)) => {
                    eprintln!("Saving the quiz failed: {e}");
                    if !self.confirm("Retry saving? [y/N] ").await? {
                        let result = quiz.result().cloned().ok_or(QuizError::NotFinished)?;
                        println!("Continuing without saving; this attempt will not appear in history.");
                        return Ok((result, false));
                    }
                    outcome = quiz_loop.persist_result(quiz).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn print_feedback(feedback: &AnswerFeedback) {
    if feedback.correct {
        println!("Correct!");
    } else {
        println!(
            "Incorrect. The answer is {}) {}",
            feedback.correct_answer, feedback.correct_text
        );
    }
    println!("{}", feedback.explanation);
    print_progress(feedback.progress, feedback.time_taken.num_seconds());
}

fn print_progress(progress: QuizProgress, seconds: i64) {
    println!(
        "({}s) {} of {} answered, {} correct so far ({:.0}%)",
        seconds,
        progress.answered,
        progress.limit,
        progress.correct,
        progress.accuracy() * 100.0
    );
}

fn print_result(result: &SessionResult) {
    println!();
    println!(
        "Finished: {} of {} correct ({:.0}%), {} level.",
        result.correct_answers(),
        result.total_questions(),
        result.accuracy() * 100.0,
        result.performance_level()
    );
    for record in result.records() {
        println!(
            "  {:<16} {:>2}/{:<2} {:>4.0}%",
            record.domain().label(),
            record.correct(),
            record.total(),
            record.percentage()
        );
    }
    let gaps = labels(result.knowledge_gaps());
    if !gaps.is_empty() {
        println!("Knowledge gaps: {gaps}");
    }
    let strengths = labels(result.strengths());
    if !strengths.is_empty() {
        println!("Strengths: {strengths}");
    }
}

fn labels(domains: Vec<&quiz_core::model::Domain>) -> String {
    domains
        .into_iter()
        .map(quiz_core::model::Domain::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_recommendations(items: &[Recommendation]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("Study plan:");
    for item in items {
        println!(
            "{}. {} ({:.0}%), about {}",
            item.rank,
            item.domain.label(),
            item.accuracy_pct,
            item.estimate
        );
        println!("   {}", item.rationale);
        if let Some(advice) = &item.advice {
            for line in advice.lines().filter(|line| !line.trim().is_empty()) {
                println!("   > {}", line.trim());
            }
        }
        println!("   Resources: {}", item.resources.join("; "));
    }
}

pub async fn print_history(services: &AppServices, user_id: &UserId, limit: u32) -> AppResult<()> {
    let history_service = services.history();
    let history = history_service.recent(user_id, limit).await?;
    if history.is_empty() {
        println!("No finished quizzes yet for {user_id}.");
        return Ok(());
    }

    println!("Recent quizzes for {user_id}:");
    for result in &history {
        println!(
            "  {}  {:<5} {:>3}/{:<3} {:>4.0}%",
            result.completed_at().format("%Y-%m-%d %H:%M"),
            result.mode(),
            result.correct_answers(),
            result.total_questions(),
            result.accuracy() * 100.0
        );
    }

    if let Some(progress) = history_service.progression(user_id, limit).await? {
        let direction = if progress.trend > 0.005 {
            "improving"
        } else if progress.trend < -0.005 {
            "declining"
        } else {
            "steady"
        };
        println!(
            "Average {:.0}% over {} quizzes, {direction} ({:+.1} points per quiz), consistency {:.2}.",
            progress.average * 100.0,
            progress.sessions,
            progress.trend * 100.0,
            progress.consistency
        );
    }
    let next = history_service.suggested_difficulty(user_id).await?;
    println!("Suggested next difficulty: {next}");
    Ok(())
}

/// One stored attempt with its saved study plan, if any.
pub async fn print_session(services: &AppServices, session_id: SessionId) -> AppResult<()> {
    let result = services.history().result(session_id).await?;
    println!(
        "Quiz {session_id} ({} mode) for {}, finished {}.",
        result.mode(),
        result.user_id(),
        result.completed_at().format("%Y-%m-%d %H:%M")
    );
    print_result(&result);
    if let Some(stored) = services.recommendations().stored(session_id).await? {
        print_recommendations(stored.items());
    }
    Ok(())
}

pub fn print_stats(bank: &QuestionBank) {
    let stats = bank.stats();
    println!(
        "{} questions, {} in the quick pool.",
        stats.total,
        bank.pool(QuizMode::Quick).len()
    );
    println!("By area:");
    for (domain, count) in &stats.by_domain {
        println!("  {:<16} {count}", domain.label());
    }
    println!("By difficulty:");
    for (difficulty, count) in &stats.by_difficulty {
        println!("  {difficulty:<16} {count}");
    }
}
