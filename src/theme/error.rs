//! Template engine error types

use thiserror::Error;

/// Template errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// No template with this name
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Compilation or rendering failed
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Embedded template is not valid UTF-8
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}
