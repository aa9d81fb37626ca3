mod content;
mod engine;
mod progression;
mod service;

// Public API of the recommendation subsystem.
pub use crate::error::RecommendError;
pub use content::{focus_for, next_step_for, resources_for};
pub use engine::RecommendationEngine;
pub use progression::{Progression, progression, suggest_next_difficulty};
pub use service::RecommendationService;
