/// Aggregated view of quiz progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizProgress {
    pub limit: u32,
    pub answered: u32,
    pub correct: u32,
    pub remaining: u32,
    pub is_complete: bool,
}

impl QuizProgress {
    /// Running fraction correct; zero before the first answer.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.answered == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.answered)
    }
}
