//! crates/derecho_core/src/email.rs
//!
//! Sign-up address checks: syntax, well-known domain typos, placeholder
//! addresses, disposable-mail domains. Messages are user-facing, in Spanish.

use std::sync::LazyLock;

use regex::Regex;

// The local part may contain `'` and `.` but must end in a letter, digit,
// `_`, `+` or `-`. Domain labels start with a letter or digit.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

/// Syntax check: the pattern, plus no leading dot and no `..` anywhere.
fn is_well_formed(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_PATTERN.is_match(email)
}

/// Misspelled domains and the domain the user almost certainly meant.
const DOMAIN_TYPOS: &[(&str, &str)] = &[
    ("gmial.com", "gmail.com"),
    ("gmai.com", "gmail.com"),
    ("gmaill.com", "gmail.com"),
    ("gmail.con", "gmail.com"),
    ("gmail.cmo", "gmail.com"),
    ("yahooo.com", "yahoo.com"),
    ("yhoo.com", "yahoo.com"),
    ("yahoo.con", "yahoo.com"),
    ("hotmai.com", "hotmail.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmail.con", "hotmail.com"),
    ("outlok.com", "outlook.com"),
    ("outlook.con", "outlook.com"),
    ("icloud.con", "icloud.com"),
    ("protonmai.com", "protonmail.com"),
];

const PLACEHOLDER_ADDRESSES: &[&str] = &[
    "test@test.com",
    "example@example.com",
    "user@domain.com",
    "email@email.com",
];

const DISPOSABLE_MARKERS: &[&str] = &[
    "tempmail",
    "10minutemail",
    "throwaway",
    "guerrillamail",
    "mailinator",
];

pub const REQUIRED_MESSAGE: &str = "El correo electrónico es requerido";
pub const INVALID_MESSAGE: &str = "Por favor ingresa un correo electrónico válido";
pub const PLACEHOLDER_MESSAGE: &str = "Por favor usa un correo electrónico válido y real";

/// Outcome of [`validate_email`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailValidation {
    pub is_valid: bool,
    pub error: Option<String>,
    /// The normalised address when valid, or the suggested fix when the
    /// domain is a known typo.
    pub corrected_email: Option<String>,
}

impl EmailValidation {
    fn valid(email: String) -> Self {
        Self {
            is_valid: true,
            error: None,
            corrected_email: Some(email),
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            corrected_email: None,
        }
    }
}

/// Looks up the intended domain for a known misspelling.
pub fn corrected_domain(domain: &str) -> Option<&'static str> {
    DOMAIN_TYPOS
        .iter()
        .find(|(typo, _)| *typo == domain)
        .map(|(_, fixed)| *fixed)
}

/// Validates and normalises an address typed by a user.
///
/// Checks run in order and the first failure wins: presence, syntax, domain
/// typo (with a suggested correction), placeholder address.
pub fn validate_email(input: &str) -> EmailValidation {
    let email = input.trim().to_lowercase();

    if email.is_empty() {
        return EmailValidation::invalid(REQUIRED_MESSAGE);
    }
    if !is_well_formed(&email) {
        return EmailValidation::invalid(INVALID_MESSAGE);
    }

    if let Some((local, domain)) = email.split_once('@') {
        if let Some(fixed) = corrected_domain(domain) {
            let suggestion = format!("{local}@{fixed}");
            return EmailValidation {
                is_valid: false,
                error: Some(format!("¿Quisiste decir {suggestion}?")),
                corrected_email: Some(suggestion),
            };
        }
    }

    if PLACEHOLDER_ADDRESSES.contains(&email.as_str()) {
        return EmailValidation::invalid(PLACEHOLDER_MESSAGE);
    }

    EmailValidation::valid(email)
}

/// True for addresses without a domain or on a disposable-mail provider.
pub fn is_suspicious_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((_, domain)) if !domain.trim().is_empty() => {
            let domain = domain.to_lowercase();
            DISPOSABLE_MARKERS
                .iter()
                .any(|marker| domain.contains(marker))
        }
        _ => true,
    }
}
