//! Form validation
//!
//! Typed forms for every page that accepts input. `validate()` is pure: it
//! checks shape and returns either the cleaned values or per-field messages
//! for re-rendering. Checks that need the database (group exists, username
//! taken) live in the services.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Key for messages that belong to the form as a whole
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors with a single message on `field`
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages for one field
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self
            .fields
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{}: {}", field, m)))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Post create/edit form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    /// Selected group id; empty means no group
    #[serde(default)]
    pub group: String,
}

/// Cleaned post form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
}

impl PostForm {
    pub fn validate(&self) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::new();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", "This field is required.");
        }

        let group = self.group.trim();
        let group_id = if group.is_empty() {
            None
        } else {
            match group.parse::<i64>() {
                Ok(id) if id > 0 => Some(id),
                _ => {
                    errors.add("group", "Select a valid choice.");
                    None
                }
            }
        };

        errors.into_result(ValidPost {
            text: text.to_string(),
            group_id,
        })
    }
}

/// Comment form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    /// Returns the trimmed comment text
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(FormErrors::single("text", "This field is required."));
        }
        Ok(text.to_string())
    }
}

/// Registration form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

/// Cleaned registration form
#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub username: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<ValidSignup, FormErrors> {
        let mut errors = FormErrors::new();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", "This field is required.");
        } else if username.chars().count() > MAX_USERNAME_LENGTH {
            errors.add(
                "username",
                format!("Ensure this value has at most {} characters.", MAX_USERNAME_LENGTH),
            );
        } else if !username.chars().all(is_username_char) {
            errors.add(
                "username",
                "Enter a valid username. Letters, digits and @/./+/-/_ only.",
            );
        }

        if self.password1.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password1",
                format!("This password is too short. It must contain at least {} characters.", MIN_PASSWORD_LENGTH),
            );
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.into_result(ValidSignup {
            username: username.to_string(),
            password: self.password1.clone(),
        })
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// Login form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl LoginForm {
    /// Returns `(username, password)`
    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", "This field is required.");
        }
        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        errors.into_result((username.to_string(), self.password.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_form_requires_text() {
        let form = PostForm {
            text: "   ".to_string(),
            group: String::new(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("text").len(), 1);
        assert!(errors.get("group").is_empty());
    }

    #[test]
    fn test_post_form_optional_group() {
        let form = PostForm {
            text: " hello ".to_string(),
            group: String::new(),
        };
        assert_eq!(
            form.validate().unwrap(),
            ValidPost {
                text: "hello".to_string(),
                group_id: None
            }
        );

        let form = PostForm {
            text: "hello".to_string(),
            group: "4".to_string(),
        };
        assert_eq!(form.validate().unwrap().group_id, Some(4));
    }

    #[test]
    fn test_post_form_rejects_bad_group() {
        for group in ["abc", "0", "-3"] {
            let form = PostForm {
                text: "hello".to_string(),
                group: group.to_string(),
            };
            let errors = form.validate().unwrap_err();
            assert_eq!(errors.get("group").len(), 1, "group {:?}", group);
        }
    }

    #[test]
    fn test_comment_form() {
        assert!(CommentForm { text: "\n".to_string() }.validate().is_err());
        assert_eq!(
            CommentForm { text: " nice ".to_string() }.validate().unwrap(),
            "nice"
        );
    }

    #[test]
    fn test_signup_form_valid() {
        let form = SignupForm {
            username: "leo.t".to_string(),
            password1: "long enough".to_string(),
            password2: "long enough".to_string(),
        };
        let valid = form.validate().unwrap();
        assert_eq!(valid.username, "leo.t");
    }

    #[test]
    fn test_signup_form_errors() {
        let form = SignupForm {
            username: "bad name!".to_string(),
            password1: "short".to_string(),
            password2: "other".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("username").len(), 1);
        assert_eq!(errors.get("password1").len(), 1);
        assert_eq!(errors.get("password2").len(), 1);
    }

    #[test]
    fn test_login_form() {
        let form = LoginForm::default();
        let errors = form.validate().unwrap_err();
        assert!(!errors.get("username").is_empty());
        assert!(!errors.get("password").is_empty());
    }

    #[test]
    fn test_form_errors_display() {
        let mut errors = FormErrors::new();
        errors.add("text", "required");
        errors.add(NON_FIELD_ERRORS, "nope");
        assert_eq!(errors.to_string(), "__all__: nope; text: required");
    }
}
