//! Local checks applied to user input before it leaves the device

use crate::error::MedibotError;

/// Longest message the chat endpoint accepts, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Phrases that indicate the user may need emergency care
pub const EMERGENCY_KEYWORDS: &[&str] = &[
    "chest pain",
    "heart attack",
    "stroke",
    "can't breathe",
    "cannot breathe",
    "difficulty breathing",
    "severe bleeding",
    "unconscious",
    "seizure",
    "suicidal",
    "suicide",
    "want to die",
    "overdose",
    "poisoning",
    "severe allergic",
    "anaphylaxis",
    "choking",
    "drowning",
    "severe head injury",
    "loss of consciousness",
    "paralysis",
    "coughing blood",
    "vomiting blood",
    "severe abdominal pain",
];

/// Reject messages the chat endpoint would refuse
///
/// # Errors
///
/// Returns `Validation` with the same wording the server uses
///
/// # Examples
///
/// ```
/// use medibot::chat::validate_message;
///
/// assert!(validate_message("I have a headache").is_ok());
/// assert!(validate_message("").is_err());
/// ```
pub fn validate_message(text: &str) -> Result<(), MedibotError> {
    if text.is_empty() {
        return Err(MedibotError::Validation("Message cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MedibotError::Validation(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_CHARS
        )));
    }
    if text.trim().chars().count() < 2 {
        return Err(MedibotError::Validation("Message too short".to_string()));
    }
    Ok(())
}

/// First emergency keyword contained in `text`, ignoring case
pub fn check_emergency(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    EMERGENCY_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lower.contains(keyword))
}

/// Fail with `Emergency` if `text` mentions an emergency symptom
pub fn screen_symptom(text: &str) -> Result<(), MedibotError> {
    match check_emergency(text) {
        Some(keyword) => Err(MedibotError::Emergency {
            keyword: keyword.to_string(),
        }),
        None => Ok(()),
    }
}
