//! Form payloads and their field validation.
//!
//! Validation here only covers what can be checked without the store;
//! handlers add errors for lookups (unknown group, taken username).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice.";

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

/// Field name -> messages, rendered next to the inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

/// Built field by field from a multipart body.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PostForm {
    pub text: String,
    /// Raw group id as submitted; empty means "no group".
    pub group: String,
    pub clear_image: bool,
}

impl PostForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }
        if self.group_id().is_err() {
            errors.add("group", INVALID_CHOICE);
        }
        errors
    }

    pub fn group_id(&self) -> Result<Option<i64>, std::num::ParseIntError> {
        let raw = self.group.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }
        errors
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();

        let len = self.username.chars().count();
        if len == 0 {
            errors.add("username", REQUIRED);
        } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
            errors.add(
                "username",
                format!("Username must be {USERNAME_MIN} to {USERNAME_MAX} characters."),
            );
        } else if !self.username.chars().all(is_username_char) {
            errors.add(
                "username",
                "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let email = self.email.trim();
        if !email.is_empty() && !email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < PASSWORD_MIN {
            errors.add(
                "password1",
                format!("This password is too short. It must contain at least {PASSWORD_MIN} characters."),
            );
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}
