use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use crate::model::{AnswerRecord, Domain, Question, QuestionId};

//
// ─── DOMAIN TALLY ──────────────────────────────────────────────────────────────
//

/// Running correct/total counts for one domain within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainTally {
    pub correct: u32,
    pub total: u32,
}

impl DomainTally {
    /// Laplace-smoothed accuracy; an untouched domain sits at 0.5.
    #[must_use]
    pub fn smoothed_accuracy(&self) -> f64 {
        (f64::from(self.correct) + 1.0) / (f64::from(self.total) + 2.0)
    }
}

/// Running tallies keyed by domain.
#[must_use]
pub fn tally_by_domain(answers: &[AnswerRecord]) -> HashMap<&Domain, DomainTally> {
    let mut tallies: HashMap<&Domain, DomainTally> = HashMap::new();
    for answer in answers {
        let tally = tallies.entry(&answer.domain).or_default();
        tally.total = tally.total.saturating_add(1);
        if answer.correct {
            tally.correct = tally.correct.saturating_add(1);
        }
    }
    tallies
}

//
// ─── SELECTOR ──────────────────────────────────────────────────────────────────
//

/// Adaptive next-question picker.
///
/// Each unseen candidate is drawn with weight `(1 - smoothed accuracy of its
/// domain) + min_weight`, so weak domains come up more often while strong
/// ones keep a floor and are never starved.
///
/// # Examples
///
/// ```
/// # use quiz_core::selector::QuestionSelector;
/// let selector = QuestionSelector::new();
/// assert!(selector.min_weight() > 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionSelector {
    min_weight: f64,
}

impl Default for QuestionSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionSelector {
    pub const DEFAULT_MIN_WEIGHT: f64 = 0.1;

    #[must_use]
    pub fn new() -> Self {
        Self {
            min_weight: Self::DEFAULT_MIN_WEIGHT,
        }
    }

    #[must_use]
    pub fn min_weight(&self) -> f64 {
        self.min_weight
    }

    #[must_use]
    pub fn weight_for(&self, tally: DomainTally) -> f64 {
        (1.0 - tally.smoothed_accuracy()) + self.min_weight
    }

    /// Pick the next question from `pool`.
    ///
    /// Questions already answered, or listed in `excluded`, are never chosen.
    /// Returns `None` when no candidate remains.
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        pool: &'a [Question],
        answers: &[AnswerRecord],
        excluded: &HashSet<QuestionId>,
        rng: &mut R,
    ) -> Option<&'a Question> {
        let answered: HashSet<QuestionId> = answers.iter().map(|a| a.question_id).collect();
        let candidates: Vec<&Question> = pool
            .iter()
            .filter(|q| !answered.contains(&q.id()) && !excluded.contains(&q.id()))
            .collect();

        match candidates.len() {
            0 => return None,
            1 => return candidates.first().copied(),
            _ => {}
        }

        let tallies = tally_by_domain(answers);
        let weights: Vec<f64> = candidates
            .iter()
            .map(|q| {
                let tally = tallies.get(q.domain()).copied().unwrap_or_default();
                self.weight_for(tally)
            })
            .collect();

        let index = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.random_range(0..candidates.len()),
        };
        candidates.get(index).copied()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
