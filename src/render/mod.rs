//! Document rendering: embedded templates, PDF layout and inspection reports

pub mod pdf;
pub mod report;
pub mod template;

pub use report::{ReportError, ReportGenerator};
pub use template::{TemplateError, TemplateRenderer};
