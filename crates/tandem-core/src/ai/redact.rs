//! Outbound prompt redaction
//!
//! Every dataset-derived string goes through [`redact`] before it is placed in
//! a prompt. Email addresses and long digit runs (account numbers, phone
//! numbers, national ids) never leave the process.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

pub const REDACTED_EMAIL: &str = "[REDACTED_EMAIL]";
pub const REDACTED_NUMBER: &str = "[REDACTED_NUMBER]";

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}")
            .expect("valid regex")
    })
}

fn long_number_pattern() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\d{8,}").expect("valid regex"))
}

/// Replace emails and digit runs of 8 or more with fixed tokens
pub fn redact(input: &str) -> Cow<'_, str> {
    // Emails first so digits inside an address don't split it
    let without_emails = email_pattern().replace_all(input, REDACTED_EMAIL);
    if !long_number_pattern().is_match(&without_emails) {
        return without_emails;
    }
    let redacted = long_number_pattern()
        .replace_all(&without_emails, REDACTED_NUMBER)
        .into_owned();
    Cow::Owned(redacted)
}

/// Owned convenience wrapper for building prompt variables
pub fn redacted(input: &str) -> String {
    redact(input).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_email_and_long_number() {
        let out = redact("contact jane.doe+sales@example.co.uk or 123456789 today");
        assert_eq!(
            out,
            "contact [REDACTED_EMAIL] or [REDACTED_NUMBER] today"
        );
    }

    #[test]
    fn test_short_numbers_survive() {
        assert_eq!(redact("store 1234567 in 2024"), "store 1234567 in 2024");
        assert!(matches!(redact("nothing here"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_exactly_eight_digits() {
        assert_eq!(redact("id 12345678"), "id [REDACTED_NUMBER]");
    }

    #[test]
    fn test_digits_inside_email_go_with_email() {
        assert_eq!(redact("u123456789@corp.io"), "[REDACTED_EMAIL]");
    }
}
