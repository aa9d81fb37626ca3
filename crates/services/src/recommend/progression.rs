//! Cross-session trends over a learner's history.

use quiz_core::model::{Difficulty, SessionResult};

/// Score trajectory across finished sessions. All scores are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progression {
    pub sessions: usize,
    pub latest: f64,
    pub average: f64,
    /// Least-squares slope per session in chronological order; positive
    /// means improving.
    pub trend: f64,
    /// `1 - population standard deviation`; 1.0 for a single session.
    pub consistency: f64,
}

/// Summarize a history given in any order. `None` when empty.
#[must_use]
pub fn progression(history: &[SessionResult]) -> Option<Progression> {
    let scores = chronological_scores(history);
    let latest = *scores.last()?;
    Some(Progression {
        sessions: scores.len(),
        latest,
        average: mean(&scores),
        trend: slope(&scores),
        consistency: consistency(&scores),
    })
}

/// Suggested difficulty for the next attempt, from the last three sessions.
///
/// Advanced needs an average of at least 85% with consistency above 0.8;
/// intermediate needs 70% with consistency above 0.6.
#[must_use]
pub fn suggest_next_difficulty(history: &[SessionResult]) -> Difficulty {
    let scores = chronological_scores(history);
    let recent = &scores[scores.len().saturating_sub(3)..];
    if recent.is_empty() {
        return Difficulty::Beginner;
    }

    let average = mean(recent);
    let consistency = consistency(recent);
    if average >= 0.85 && consistency > 0.8 {
        Difficulty::Advanced
    } else if average >= 0.7 && consistency > 0.6 {
        Difficulty::Intermediate
    } else {
        Difficulty::Beginner
    }
}

fn chronological_scores(history: &[SessionResult]) -> Vec<f64> {
    let mut ordered: Vec<&SessionResult> = history.iter().collect();
    ordered.sort_by_key(|r| r.completed_at());
    ordered.into_iter().map(SessionResult::accuracy).collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn consistency(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 1.0;
    }
    let avg = mean(values);
    let variance = mean(&values.iter().map(|v| (v - avg).powi(2)).collect::<Vec<_>>());
    1.0 - variance.sqrt()
}

#[allow(clippy::cast_precision_loss)]
fn slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    num / den
}
