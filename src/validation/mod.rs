/// Input validation module
///
/// Pure checks for account and upload forms. Nothing here returns an error
/// for bad input; failures come back as structured results for the caller
/// to surface.
use crate::error::TubeError;
use lazy_static::lazy_static;
use regex::Regex;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const COMMENT_MAX_CHARS: usize = 2000;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,30}$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of validating a form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Human-readable messages, in rule order
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Convert a failing report into an error, passing valid reports through
    pub fn into_result(self) -> Result<(), TubeError> {
        if self.valid {
            Ok(())
        } else {
            Err(validation_errors_to_tube_error(self.errors))
        }
    }
}

/// Password rule check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Fields checked before a video is accepted
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: &'a str,
}

/// Conventional `local@domain.tld` shape
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Letters, digits and underscores only, 3 to 30 characters
pub fn validate_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// Turn an arbitrary seed (e.g. an email local part) into a valid username.
///
/// Disallowed characters become `_`, long seeds are cut and short ones padded.
pub fn username_from_seed(seed: &str) -> String {
    let mut username: String = seed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(USERNAME_MAX_CHARS)
        .collect();
    while username.len() < USERNAME_MIN_CHARS {
        username.push('_');
    }
    username
}

/// `base` with a numeric suffix, still within the length limit
pub fn username_with_suffix(base: &str, n: usize) -> String {
    let suffix = format!("_{}", n);
    let keep = USERNAME_MAX_CHARS.saturating_sub(suffix.len());
    let mut username: String = base.chars().take(keep).collect();
    username.push_str(&suffix);
    username
}

pub fn validate_password(password: &str) -> PasswordCheck {
    let mut errors = Vec::new();

    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_CHARS
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one digit".to_string());
    }

    PasswordCheck {
        valid: errors.is_empty(),
        errors,
    }
}

pub fn validate_video_metadata(data: &VideoMetadata<'_>) -> ValidationReport {
    let mut errors = Vec::new();

    let title_len = data.title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
        errors.push(ValidationError::new(
            "title",
            format!(
                "Title must be between {} and {} characters",
                TITLE_MIN_CHARS, TITLE_MAX_CHARS
            ),
        ));
    }

    if let Some(description) = data.description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            errors.push(ValidationError::new(
                "description",
                format!(
                    "Description cannot exceed {} characters",
                    DESCRIPTION_MAX_CHARS
                ),
            ));
        }
    }

    if data.category.trim().is_empty() {
        errors.push(ValidationError::new("category", "Category is required"));
    }

    ValidationReport::from_errors(errors)
}

pub fn validate_comment(content: &str) -> ValidationReport {
    let mut errors = Vec::new();
    let trimmed = content.trim();

    if trimmed.is_empty() {
        errors.push(ValidationError::new("content", "Comment cannot be empty"));
    } else if trimmed.chars().count() > COMMENT_MAX_CHARS {
        errors.push(ValidationError::new(
            "content",
            format!("Comment cannot exceed {} characters", COMMENT_MAX_CHARS),
        ));
    }

    ValidationReport::from_errors(errors)
}

/// Strip `<...>` spans and surrounding whitespace.
///
/// Not an HTML sanitizer: unbalanced brackets and entities pass through.
pub fn sanitize_input(input: &str) -> String {
    TAG_RE.replace_all(input, "").trim().to_string()
}

/// Convert validation errors to TubeError
pub fn validation_errors_to_tube_error(errors: Vec<ValidationError>) -> TubeError {
    TubeError::Validation(errors.into_iter().map(|e| e.message).collect())
}
