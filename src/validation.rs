//! Field-level input checks. Each check records its message under the field
//! name so a request can report every problem at once.

use crate::error::FieldErrors;

pub const NAME_MAX: usize = 256;
pub const SLUG_MAX: usize = 50;
pub const TEXT_MAX: usize = 256;
pub const USERNAME_MAX: usize = 150;
pub const EMAIL_MAX: usize = 254;
pub const PERSON_NAME_MAX: usize = 150;

pub const SCORE_MIN: i32 = 1;
pub const SCORE_MAX: i32 = 10;

/// Path segment that addresses the caller's own profile.
pub const RESERVED_USERNAME: &str = "me";

pub fn username(errors: &mut FieldErrors, value: &str) {
    if value.is_empty() {
        errors.add("username", "this field may not be blank");
        return;
    }
    if value.chars().count() > USERNAME_MAX {
        errors.add("username", format!("ensure this field has no more than {USERNAME_MAX} characters"));
    }
    if value.eq_ignore_ascii_case(RESERVED_USERNAME) {
        errors.add("username", format!("'{RESERVED_USERNAME}' cannot be used as a username"));
    }
    if !value.chars().all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_')) {
        errors.add("username", "may contain only letters, digits and the characters . @ + - _");
    }
}

pub fn email(errors: &mut FieldErrors, value: &str) {
    if value.is_empty() {
        errors.add("email", "this field may not be blank");
        return;
    }
    if value.chars().count() > EMAIL_MAX {
        errors.add("email", format!("ensure this field has no more than {EMAIL_MAX} characters"));
    }
    let well_formed = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        },
        None => false,
    };
    if !well_formed {
        errors.add("email", "enter a valid email address");
    }
}

pub fn slug(errors: &mut FieldErrors, value: &str) {
    if value.is_empty() {
        errors.add("slug", "this field may not be blank");
        return;
    }
    if value.len() > SLUG_MAX {
        errors.add("slug", format!("ensure this field has no more than {SLUG_MAX} characters"));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        errors.add("slug", "may contain only latin letters, digits, hyphens and underscores");
    }
}

/// Required, bounded text such as a title name or review body.
pub fn bounded_text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, "this field may not be blank");
    } else if value.chars().count() > max {
        errors.add(field, format!("ensure this field has no more than {max} characters"));
    }
}

/// Optional text that may be empty but not longer than `max`.
pub fn optional_text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("ensure this field has no more than {max} characters"));
    }
}

pub fn score(errors: &mut FieldErrors, value: i32) {
    if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
        errors.add("score", format!("score must be between {SCORE_MIN} and {SCORE_MAX}"));
    }
}

pub fn year(errors: &mut FieldErrors, value: i32, current_year: i32) {
    if value > current_year {
        errors.add("year", "release year cannot be later than the current year");
    }
}

pub fn current_year() -> i32 {
    let today: jiff::civil::Date = jiff::Zoned::now().into();
    i32::from(today.year())
}
