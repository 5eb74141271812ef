//! Text rendering from embedded templates

use miette::Diagnostic;
use rust_embed::Embed;
use serde::Serialize;
use tera::Tera;
use thiserror::Error;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

pub const REPORT_TEMPLATE: &str = "report.txt.tera";
pub const REMINDER_TEMPLATE: &str = "reminder.txt.tera";

/// Renders the report and reminder templates compiled into the binary
pub struct TemplateRenderer {
    tera: Tera,
}

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    RenderError(String),
}

/// Tera errors carry the useful part in their source chain
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl TemplateRenderer {
    /// Create a renderer with all embedded templates loaded
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                if let Ok(template_str) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(filename, template_str)
                        .map_err(|e| TemplateError::RenderError(describe(&e)))?;
                }
            }
        }

        Ok(Self { tera })
    }

    /// Render a template with a serializable context
    pub fn render<C: Serialize>(&self, name: &str, context: &C) -> Result<String, TemplateError> {
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        let context = tera::Context::from_serialize(context)
            .map_err(|e| TemplateError::RenderError(describe(&e)))?;
        self.tera
            .render(name, &context)
            .map_err(|e| TemplateError::RenderError(describe(&e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_templates_are_loaded() {
        let renderer = TemplateRenderer::new().unwrap();
        let names: Vec<_> = renderer.tera.get_template_names().collect();
        assert!(names.contains(&REPORT_TEMPLATE));
        assert!(names.contains(&REMINDER_TEMPLATE));
    }

    #[test]
    fn test_unknown_template() {
        let renderer = TemplateRenderer::new().unwrap();
        let err = renderer.render("missing.tera", &()).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }
}
