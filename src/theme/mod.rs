//! Template engine
//!
//! HTML templates live in `templates/` and are embedded into the binary at
//! build time. They are compiled once into a single Tera instance, so
//! `{% extends %}` and `{% include %}` resolve across the whole set.
//!
//! Every page receives the standard variables from [`StandardTemplateVars`]
//! on top of its own context.

use anyhow::Result;
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct TemplateAssets;

/// Renders the site's pages
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Compile the embedded templates
    pub fn new() -> Result<Self> {
        let mut templates = Vec::new();
        for name in TemplateAssets::iter() {
            let Some(file) = TemplateAssets::get(&name) else {
                continue;
            };
            let source = String::from_utf8(file.data.into_owned())
                .map_err(|e| ThemeError::InvalidTemplate(format!("{}: {}", name, e)))?;
            templates.push((name.into_owned(), source));
        }
        Self::from_sources(templates)
    }

    /// Compile templates from `(name, source)` pairs
    pub fn from_sources<N, S>(templates: Vec<(N, S)>) -> Result<Self>
    where
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(error_chain(&e)))?;
        tracing::debug!("Loaded {} templates", tera.get_template_names().count());
        Ok(Self { tera })
    }

    /// Whether a template with this name exists
    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()).into());
        }
        self.tera.render(template, context).map_err(|e| {
            let message = format!("Failed to render '{}': {}", template, error_chain(&e));
            ThemeError::TemplateError(message).into()
        })
    }

    /// Render a template with the standard variables added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        if let Some(ref user) = standard_vars.current_user {
            full_context.insert("current_user", user);
        }
        self.render(template, &full_context)
    }

    /// Render a template, falling back to a plain HTML page if it fails.
    ///
    /// Used for error pages, which must produce a body even when the
    /// templates themselves are broken.
    pub fn render_with_fallback(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> String {
        match self.render_with_standard_vars(template, context, standard_vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {:#}", template, e);
                simple_error_page(template)
            }
        }
    }
}

/// Variables every page template can use
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    /// Logged-in viewer, if any
    pub current_user: Option<CurrentUser>,
    /// Path of the current request
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
}

/// The viewer as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>) -> Self {
        Self {
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}

/// Tera errors nest their cause; flatten it into one message.
fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn simple_error_page(template: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Error</title>
</head>
<body>
    <h1>Something went wrong</h1>
    <p>The page could not be displayed (<code>{}</code>).</p>
</body>
</html>"#,
        template
    )
}
