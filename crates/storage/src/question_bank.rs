//! Read-only question store loaded from a local JSON file at startup.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use quiz_core::model::{
    Difficulty, Domain, QuestionDraft, QuestionError, QuizMode, Question, QuestionId,
};
use serde::Deserialize;
use thiserror::Error;

/// Failures while loading the question bank. All of them are fatal at startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("failed to read question bank {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid question: {0}")]
    Invalid(#[from] QuestionError),

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),

    #[error("demo list references unknown question id {0}")]
    UnknownDemoId(QuestionId),

    #[error("question bank contains no questions")]
    Empty,

    #[error("question bank {path}: {source}")]
    InvalidFile {
        path: String,
        #[source]
        source: Box<QuestionBankError>,
    },
}

#[derive(Debug, Deserialize)]
struct BankFile {
    questions: Vec<RawQuestion>,
    #[serde(default)]
    demo_questions: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    id: u64,
    question_text: String,
    options: BTreeMap<String, String>,
    correct_answer: String,
    knowledge_area: String,
    difficulty_level: String,
    #[serde(default)]
    explanation: Option<String>,
}

impl RawQuestion {
    fn into_question(self) -> Result<Question, QuestionError> {
        QuestionDraft {
            id: QuestionId::new(self.id),
            domain: Domain::new(self.knowledge_area)?,
            difficulty: self.difficulty_level.parse()?,
            prompt: self.question_text,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
        .validate()
    }
}

/// Distribution of the bank across domains and difficulty levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBankStats {
    pub total: usize,
    pub by_domain: BTreeMap<Domain, usize>,
    pub by_difficulty: BTreeMap<Difficulty, usize>,
}

/// Immutable collection of validated questions, owned for the process lifetime.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
    demo: Vec<Question>,
}

impl QuestionBank {
    /// Load and validate a question bank file.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if the file is missing, malformed, or
    /// contains invalid questions.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionBankError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| QuestionBankError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let bank = Self::from_json_str(&raw).map_err(|source| QuestionBankError::InvalidFile {
            path: path.display().to_string(),
            source: Box::new(source),
        })?;
        tracing::info!(
            path = %path.display(),
            questions = bank.len(),
            demo = bank.demo.len(),
            "question bank loaded"
        );
        Ok(bank)
    }

    /// Parse a question bank from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` on malformed JSON, invalid or duplicate
    /// questions, unknown demo ids, or an empty bank.
    pub fn from_json_str(raw: &str) -> Result<Self, QuestionBankError> {
        let file: BankFile = serde_json::from_str(raw)?;
        let mut questions = Vec::with_capacity(file.questions.len());
        for raw_question in file.questions {
            questions.push(raw_question.into_question()?);
        }
        Self::new(
            questions,
            file.demo_questions.into_iter().map(QuestionId::new).collect(),
        )
    }

    /// Build a bank from already validated questions.
    ///
    /// # Errors
    ///
    /// Returns `Empty`, `DuplicateId`, or `UnknownDemoId`.
    pub fn new(
        questions: Vec<Question>,
        demo_ids: Vec<QuestionId>,
    ) -> Result<Self, QuestionBankError> {
        if questions.is_empty() {
            return Err(QuestionBankError::Empty);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuestionBankError::DuplicateId(question.id()));
            }
        }

        let mut demo = Vec::with_capacity(demo_ids.len());
        let mut demo_seen = HashSet::new();
        for id in demo_ids {
            if !demo_seen.insert(id) {
                continue;
            }
            let question = questions
                .iter()
                .find(|q| q.id() == id)
                .ok_or(QuestionBankError::UnknownDemoId(id))?;
            demo.push(question.clone());
        }

        Ok(Self { questions, demo })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Candidate questions for a mode.
    ///
    /// Quick mode uses the demo subset when one is declared, the whole bank otherwise.
    #[must_use]
    pub fn pool(&self, mode: QuizMode) -> &[Question] {
        match mode {
            QuizMode::Quick if !self.demo.is_empty() => &self.demo,
            _ => &self.questions,
        }
    }

    #[must_use]
    pub fn stats(&self) -> QuestionBankStats {
        let mut by_domain = BTreeMap::new();
        let mut by_difficulty = BTreeMap::new();
        for question in &self.questions {
            *by_domain.entry(question.domain().clone()).or_insert(0) += 1;
            *by_difficulty.entry(question.difficulty()).or_insert(0) += 1;
        }
        QuestionBankStats {
            total: self.questions.len(),
            by_domain,
            by_difficulty,
        }
    }
}
