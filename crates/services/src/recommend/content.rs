//! Curated study content per known domain.

use quiz_core::model::Domain;

const GENERIC_FOCUS: &str = "Focus on fundamental concepts";
const GENERIC_RESOURCES: &[&str] = &["General ML resources"];

/// Focus line for a domain, without the performance-dependent suffix.
#[must_use]
pub fn focus_for(domain: &Domain) -> &'static str {
    match domain.as_str() {
        "transformers" => "Focus on understanding attention mechanisms and positional encoding",
        "gans" => "Start with basic GAN theory and gradually move to advanced architectures",
        "pytorch" => "Practice tensor operations and autograd functionality",
        "generative_ai" => "Explore different generative models and their applications",
        "deep_learning" => "Strengthen fundamentals in neural network architectures",
        "ml_basics" => "Review core concepts like supervised/unsupervised learning",
        _ => GENERIC_FOCUS,
    }
}

/// Next step suggested for a given accuracy in [0, 1].
#[must_use]
pub fn next_step_for(accuracy: f64) -> &'static str {
    if accuracy < 0.4 {
        "Start with basic tutorials and hands-on practice."
    } else if accuracy < 0.7 {
        "Try intermediate projects and real-world applications."
    } else {
        "Explore advanced topics and research papers."
    }
}

#[must_use]
pub fn resources_for(domain: &Domain) -> Vec<String> {
    let list: &[&str] = match domain.as_str() {
        "ml_basics" => &[
            "Machine Learning Yearning by Andrew Ng",
            "Hands-On Machine Learning with Scikit-Learn and TensorFlow",
            "ML Crash Course by Google",
        ],
        "deep_learning" => &[
            "Deep Learning by Ian Goodfellow",
            "CS231n: Convolutional Neural Networks for Visual Recognition",
            "Fast.ai Deep Learning for Coders",
        ],
        "pytorch" => &[
            "PyTorch Tutorials (official documentation)",
            "Deep Learning with PyTorch by Eli Stevens",
            "PyTorch Lightning documentation",
        ],
        "transformers" => &[
            "Attention Is All You Need (original paper)",
            "The Illustrated Transformer by Jay Alammar",
            "Hugging Face Transformers course",
        ],
        "gans" => &[
            "Generative Adversarial Networks (original paper)",
            "GAN Specialization on Coursera",
            "PyTorch GAN implementations",
        ],
        "generative_ai" => &[
            "Introduction to Generative AI by Google",
            "Generative Deep Learning book",
            "OpenAI GPT papers and documentation",
        ],
        _ => GENERIC_RESOURCES,
    };
    list.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_domains() {
        let gans = Domain::new("GANs").unwrap();
        assert!(focus_for(&gans).contains("GAN theory"));
        assert_eq!(resources_for(&gans).len(), 3);

        let other = Domain::new("reinforcement_learning").unwrap();
        assert_eq!(focus_for(&other), GENERIC_FOCUS);
        assert_eq!(resources_for(&other), vec!["General ML resources".to_string()]);
    }

    #[test]
    fn next_step_bands() {
        assert!(next_step_for(0.2).starts_with("Start with basic"));
        assert!(next_step_for(0.4).starts_with("Try intermediate"));
        assert!(next_step_for(0.7).starts_with("Explore advanced"));
    }
}
