use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quiz_core::model::{
    AdviceSettings, Recommendation, RecommendationResult, ScoreRecord, SessionResult,
    StudyEstimate,
};
use tokio::time::{Instant, timeout_at};

use super::content::{focus_for, next_step_for, resources_for};
use crate::Clock;
use crate::advice::{AdviceProvider, advice_prompt};
use crate::error::{AdviceError, RecommendError};

/// Ranks weak domains and attaches study guidance.
///
/// The ranking and rule-based text are a pure function of the scores and
/// history. Advice from the optional provider is fetched afterwards under a
/// single deadline and only ever fills `Recommendation::advice`. Answers
/// are memoized per prompt for the engine's lifetime; clones share the memo.
#[derive(Clone)]
pub struct RecommendationEngine {
    clock: Clock,
    advisor: Option<Arc<dyn AdviceProvider>>,
    advice_timeout: Duration,
    advice_cache: Arc<Mutex<HashMap<String, String>>>,
    max_items: usize,
}

impl RecommendationEngine {
    pub const DEFAULT_MAX_ITEMS: usize = 5;

    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            advisor: None,
            advice_timeout: Duration::from_secs(AdviceSettings::DEFAULT_TIMEOUT_SECS),
            advice_cache: Arc::new(Mutex::new(HashMap::new())),
            max_items: Self::DEFAULT_MAX_ITEMS,
        }
    }

    #[must_use]
    pub fn with_advisor(
        mut self,
        advisor: Option<Arc<dyn AdviceProvider>>,
        timeout: Duration,
    ) -> Self {
        self.advisor = advisor;
        self.advice_timeout = timeout;
        self
    }

    /// Cap on the number of ranked items. Zero is treated as one.
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    #[must_use]
    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Rule-based ranking only: weakest domain first, truncated.
    ///
    /// Ties on accuracy go to the domain with fewer answered questions, then
    /// to the domain name, so repeated calls always agree.
    #[must_use]
    pub fn rank(&self, records: &[ScoreRecord], history: &[SessionResult]) -> Vec<Recommendation> {
        let mut ordered: Vec<&ScoreRecord> = records.iter().collect();
        ordered.sort_by(|a, b| compare_weakest_first(a, b));

        ordered
            .into_iter()
            .take(self.max_items)
            .zip(1_u32..)
            .map(|(record, rank)| Recommendation {
                rank,
                domain: record.domain().clone(),
                accuracy_pct: record.percentage(),
                rationale: rationale(record, history),
                resources: resources_for(record.domain()),
                estimate: StudyEstimate::from_accuracy(record.accuracy()),
                advice: None,
            })
            .collect()
    }

    /// Rank `result` against earlier `history` and try to enrich with advice.
    ///
    /// Only sessions completed before `result` feed the trend lines; `result`
    /// itself and any later attempts in `history` are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RecommendError` only if the ranked items are malformed.
    /// Advice failures never surface here.
    pub async fn recommend(
        &self,
        result: &SessionResult,
        history: &[SessionResult],
    ) -> Result<RecommendationResult, RecommendError> {
        let earlier: Vec<SessionResult> = history
            .iter()
            .filter(|h| {
                h.session_id() != result.session_id() && h.completed_at() < result.completed_at()
            })
            .cloned()
            .collect();
        let mut items = self.rank(result.records(), &earlier);
        self.attach_advice(&mut items, result.records()).await;

        tracing::info!(
            session_id = %result.session_id(),
            items = items.len(),
            advised = items.iter().filter(|i| i.advice.is_some()).count(),
            "recommendations generated"
        );
        Ok(RecommendationResult::new(
            result.session_id(),
            self.clock.now(),
            items,
        )?)
    }

    async fn attach_advice(&self, items: &mut [Recommendation], records: &[ScoreRecord]) {
        let Some(advisor) = &self.advisor else {
            return;
        };
        let deadline = Instant::now() + self.advice_timeout;

        for item in items.iter_mut() {
            let Some(record) = records.iter().find(|r| r.domain() == &item.domain) else {
                continue;
            };
            let prompt = advice_prompt(record, records);
            if let Some(cached) = self.cached_advice(&prompt) {
                item.advice = Some(cached);
                continue;
            }
            match timeout_at(deadline, advisor.advise(&prompt)).await {
                Ok(Ok(text)) => {
                    if let Ok(mut cache) = self.advice_cache.lock() {
                        cache.insert(prompt, text.clone());
                    }
                    item.advice = Some(text);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        provider = advisor.name(),
                        domain = %item.domain,
                        error = %e,
                        "advice unavailable, using rule-based text"
                    );
                }
                Err(_) => {
                    let err = AdviceError::Timeout(self.advice_timeout.as_secs());
                    tracing::warn!(
                        provider = advisor.name(),
                        error = %err,
                        "advice unavailable, using rule-based text"
                    );
                    // The deadline is shared, so the remaining calls would fail too.
                    break;
                }
            }
        }
    }
}

impl RecommendationEngine {
    fn cached_advice(&self, prompt: &str) -> Option<String> {
        self.advice_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(prompt).cloned())
    }
}

/// Exact ordering on `correct / total` by cross-multiplication.
fn compare_weakest_first(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    let lhs = u64::from(a.correct()) * u64::from(b.total());
    let rhs = u64::from(b.correct()) * u64::from(a.total());
    lhs.cmp(&rhs)
        .then_with(|| a.total().cmp(&b.total()))
        .then_with(|| a.domain().cmp(b.domain()))
}

fn rationale(record: &ScoreRecord, history: &[SessionResult]) -> String {
    let mut text = format!(
        "{}: {:.0}% correct ({} of {}). {}. {}",
        record.domain().label(),
        record.percentage(),
        record.correct(),
        record.total(),
        focus_for(record.domain()),
        next_step_for(record.accuracy()),
    );
    if let Some(previous) = previous_percentage(record, history) {
        let delta = record.percentage() - previous;
        if delta.abs() < 0.5 {
            text.push_str(" Unchanged since your last attempt.");
        } else if delta > 0.0 {
            let _ = write!(text, " Up {delta:.0} points since your last attempt.");
        } else {
            let _ = write!(text, " Down {:.0} points since your last attempt.", -delta);
        }
    }
    text
}

/// Percentage in the most recent earlier session that covered the domain.
fn previous_percentage(record: &ScoreRecord, history: &[SessionResult]) -> Option<f64> {
    history
        .iter()
        .filter_map(|h| {
            h.record_for(record.domain())
                .map(|r| (h.completed_at(), r.percentage()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, pct)| pct)
}
