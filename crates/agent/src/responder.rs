use rand::seq::SliceRandom;
use rand::Rng;

pub const GREETINGS: [&str; 3] = [
    "Hello! I'm LandlordBuddy, your AI assistant for property management. I can help you with \
     rent pricing, tenant screening, and maintenance predictions. What would you like to do \
     today?",
    "Hi there! I'm here to help you with all your landlord needs. Whether you want to estimate \
     rent, screen a tenant, or predict maintenance issues, just let me know!",
    "Good day! Welcome to LandlordBuddy. How can I assist you with your property management \
     today?",
];

/// Checked in order; the first rule with a matching cue answers.
const SMALL_TALK: &[(&[&str], &str)] = &[
    (
        &["thank", "thanks"],
        "You're welcome! I'm happy to help with your property management needs.",
    ),
    (
        &["help", "what can you do"],
        "I can help you with three main tasks: 1) Rent pricing estimates, 2) Tenant screening, \
         and 3) Maintenance predictions. Which would you like to try?",
    ),
    (
        &["bye", "goodbye", "see you"],
        "Goodbye! Feel free to come back anytime you need help with your properties.",
    ),
    (
        &["how are you", "how do you do"],
        "I'm doing great and ready to help you with your landlord tasks! What can I assist you \
         with today?",
    ),
];

const SMALL_TALK_DEFAULT: &str =
    "I'm here to help you with property management. What would you like to do today?";

pub const UNSUPPORTED_REQUEST: &str = "I'm sorry, I couldn't clearly understand your request. \
    I can help you with:\n\
    - **Rent Pricing**: Estimate the rent for your property\n\
    - **Tenant Screening**: Assess a tenant applicant\n\
    - **Maintenance Prediction**: Predict maintenance needs\n\n\
    Which of these would you like to do?";

pub fn greeting() -> &'static str {
    greeting_with(&mut rand::thread_rng())
}

pub fn greeting_with<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    GREETINGS.choose(rng).copied().unwrap_or(GREETINGS[0])
}

pub fn small_talk(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    SMALL_TALK
        .iter()
        .find(|(cues, _)| cues.iter().any(|cue| lowered.contains(cue)))
        .map_or(SMALL_TALK_DEFAULT, |(_, reply)| *reply)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{greeting_with, small_talk, GREETINGS};

    #[test]
    fn greeting_is_one_of_the_fixed_replies() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            assert!(GREETINGS.contains(&greeting_with(&mut rng)));
        }
    }

    #[test]
    fn small_talk_follows_cue_order() {
        assert!(small_talk("Thanks so much!").starts_with("You're welcome!"));
        assert!(small_talk("what can you do?").starts_with("I can help you with three"));
        assert!(small_talk("ok, see you later").starts_with("Goodbye!"));
        assert!(small_talk("How are you?").starts_with("I'm doing great"));
        assert!(small_talk("nice weather").starts_with("I'm here to help"));
    }

    #[test]
    fn thanks_wins_over_goodbye() {
        assert!(small_talk("thanks, bye").starts_with("You're welcome!"));
    }
}
