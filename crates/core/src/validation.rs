//! Client-side form validation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PopupError, PopupResult};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";

/// Syntactic check only: `local@domain.tld`, no whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trim surrounding whitespace and validate. Returns the address to submit.
pub fn validate_email(raw: &str) -> PopupResult<&str> {
    let email = raw.trim();
    if email.is_empty() || !is_valid_email(email) {
        return Err(PopupError::Validation(INVALID_EMAIL_MESSAGE.to_string()));
    }
    Ok(email)
}
