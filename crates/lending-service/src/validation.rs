//! Input validation and normalisation shared by every transport.
//!
//! All checks here are pure. Failures use the caller-safe `LendingError`
//! variants so both the gRPC and the JSON surfaces report them identically.

use crate::errors::LendingError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Smallest principal or investment amount accepted.
pub const MIN_AMOUNT: Decimal = Decimal::ONE_THOUSAND;

/// Largest principal or investment amount accepted.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Money and percentages carry at most two fractional digits.
pub const MONEY_SCALE: u32 = 2;

const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_PHONE_LENGTH: usize = 4;

/// Email shape check: one `@`, non-empty local part, dotted domain with no
/// empty labels.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return false;
    }

    let mut labels = domain.split('.');
    let has_dot = domain.contains('.');
    has_dot && labels.all(|label| !label.is_empty())
}

/// Password policy: at least 8 characters with a digit, an uppercase letter
/// and a punctuation or symbol character.
pub fn validate_password(password: &str) -> Result<(), LendingError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(LendingError::PasswordTooWeak);
    }

    let mut number = false;
    let mut upper = false;
    let mut special = false;
    for c in password.chars() {
        if c.is_numeric() {
            number = true;
        } else if c.is_uppercase() {
            upper = true;
        } else if c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()) {
            special = true;
        }
    }

    if number && upper && special {
        Ok(())
    } else {
        Err(LendingError::PasswordTooWeak)
    }
}

/// Remove the separators users type inside phone numbers.
pub fn remove_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '_'))
        .collect()
}

/// Normalise a phone number to international form.
///
/// A leading `0` is replaced by `country_code`, a leading `+` is kept, any
/// other number gets a `+` prefix. Empty input stays empty.
pub fn phone_with_country_code(value: &str, country_code: &str) -> String {
    let value = remove_separators(value);
    if let Some(rest) = value.strip_prefix('0') {
        format!("{country_code}{rest}")
    } else if value.is_empty() || value.starts_with('+') {
        value
    } else {
        format!("+{value}")
    }
}

/// Phone numbers shorter than 4 characters are treated as absent.
pub fn meaningful_phone(value: &str) -> Option<&str> {
    (value.chars().count() >= MIN_PHONE_LENGTH).then_some(value)
}

/// Parse a decimal string with at most two fractional digits.
pub fn parse_decimal(field: &str, value: &str) -> Result<Decimal, LendingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LendingError::Validation(format!("{field} is required.")));
    }

    let parsed = Decimal::from_str(trimmed)
        .map_err(|_| LendingError::Validation(format!("{field} must be a decimal number.")))?;

    if parsed.normalize().scale() > MONEY_SCALE {
        return Err(LendingError::Validation(format!(
            "{field} must have at most {MONEY_SCALE} decimal places."
        )));
    }

    Ok(parsed)
}

/// Parse a principal amount and check it against the platform bounds.
pub fn parse_principal(value: &str) -> Result<Decimal, LendingError> {
    let amount = parse_decimal("principal_amount", value)?;
    if amount < MIN_AMOUNT {
        return Err(LendingError::Validation(format!(
            "principal_amount must be greater than or equal {MIN_AMOUNT}."
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(LendingError::Validation(format!(
            "principal_amount must be lower than or equal {MAX_AMOUNT}."
        )));
    }
    Ok(amount)
}

/// Parse a percentage in [0, 100].
pub fn parse_percentage(field: &str, value: &str) -> Result<Decimal, LendingError> {
    let pct = parse_decimal(field, value)?;
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(LendingError::Validation(format!(
            "{field} must be between 0 and 100."
        )));
    }
    Ok(pct)
}

/// True when `amount` lies inside [`MIN_AMOUNT`, `MAX_AMOUNT`].
pub fn amount_in_bounds(amount: Decimal) -> bool {
    (MIN_AMOUNT..=MAX_AMOUNT).contains(&amount)
}

/// Require an absolute http(s) URL.
pub fn validate_url(field: &str, value: &str) -> Result<(), LendingError> {
    let url = reqwest::Url::parse(value.trim())
        .map_err(|_| LendingError::Validation(format!("{field}: invalid URL.")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LendingError::Validation(format!("{field}: invalid URL.")));
    }
    Ok(())
}

/// Loan ids start at 1.
pub fn validate_loan_id(loan_id: i64) -> Result<(), LendingError> {
    if loan_id < 1 {
        return Err(LendingError::Validation(
            "loan_id must be greater than or equal 1.".to_string(),
        ));
    }
    Ok(())
}

pub fn require(field: &str, value: &str) -> Result<(), LendingError> {
    if value.trim().is_empty() {
        return Err(LendingError::Validation(format!("{field} is required.")));
    }
    Ok(())
}
