//! Chat conversation helpers
//!
//! - [`screening`]: input validation and emergency keyword detection
//! - [`session`]: the in-progress conversation and its conversion to a
//!   saved transcript

pub mod screening;
pub mod session;

pub use screening::{
    check_emergency, screen_symptom, validate_message, EMERGENCY_KEYWORDS, MAX_MESSAGE_CHARS,
};
pub use session::ChatSession;
