//! Form field state and client-side validation.
//!
//! Errors are collected per field into [`FieldErrors`] so they can be shown
//! next to the input they belong to. The server validates again.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::{ClientResult, FieldErrors};
use crate::models::{Article, ArticleDraft};

const COMMON_PASSWORDS: &[&str] = &["password", "12345678", "qwerty123"];
const MIN_PASSWORD_LEN: usize = 8;
const MAX_SIMILARITY_DISTANCE: usize = 2;

/// Create/edit article form. Tags are typed as one comma-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleForm {
    pub title: String,
    pub content: String,
    pub tags: String,
}

impl ArticleForm {
    /// Pre-fill from an existing article, tags joined by `", "`.
    pub fn from_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            content: article.content.clone(),
            tags: article.tags.join(", "),
        }
    }

    pub fn parsed_tags(&self) -> Vec<String> {
        parse_tags(&self.tags)
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "Title is required");
        }
        if self.content.trim().is_empty() {
            errors.add("content", "Content is required");
        }
        errors
    }

    pub fn to_draft(&self) -> ClientResult<ArticleDraft> {
        self.validate().into_result()?;
        Ok(ArticleDraft {
            title: self.title.trim().to_string(),
            content: self.content.clone(),
            tags: self.parsed_tags(),
        })
    }
}

pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "Username is required");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors
    }
}

/// Registration fields, sent as multipart form data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    /// `YYYY-MM-DD`, or empty.
    pub birth_date: String,
    pub profile_pic: Option<PathBuf>,
}

impl Registration {
    /// Non-empty text fields in submission order; empty optionals are omitted.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
            ("password2", &self.password2),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("bio", &self.bio),
            ("birth_date", &self.birth_date),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name, value.clone()))
        .collect()
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.username.trim().is_empty() {
            errors.add("username", "Username is required");
        }

        if self.email.trim().is_empty() {
            errors.add("email", "Email is required");
        } else if !looks_like_email(self.email.trim()) {
            errors.add("email", "Invalid email address");
        }

        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else {
            for message in password_problems(&self.password, &self.username, &self.email) {
                errors.add("password", message);
            }
        }

        if self.password2.is_empty() {
            errors.add("password2", "Please confirm your password");
        } else if self.password2 != self.password {
            errors.add("password2", "Passwords must match");
        }

        if !self.birth_date.trim().is_empty()
            && NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d").is_err()
        {
            errors.add("birth_date", "Birth date must be YYYY-MM-DD");
        }

        errors
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn password_problems(password: &str, username: &str, email: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain at least one number");
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        problems.push("Password must contain at least one special character");
    }
    if COMMON_PASSWORDS.contains(&password) {
        problems.push("Password is too common");
    }
    if too_similar(password, username, email) {
        problems.push("Password is too similar to username or email");
    }
    problems
}

/// Only checked once both username and email are filled in.
fn too_similar(password: &str, username: &str, email: &str) -> bool {
    if username.is_empty() || email.is_empty() {
        return false;
    }
    let password = password.to_lowercase();
    let username = username.to_lowercase();
    let local = email.split('@').next().unwrap_or_default().to_lowercase();

    [username, local].iter().filter(|s| !s.is_empty()).any(|other| {
        password.contains(other.as_str()) || levenshtein(&password, other) <= MAX_SIMILARITY_DISTANCE
    })
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
