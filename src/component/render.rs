//! Template rendering seam.

use thiserror::Error;

use super::writer::ResponseWriter;
use crate::context::Params;

/// Errors produced by a [`TemplateRenderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template page not found: {page}")]
    PageNotFound { page: String },

    #[error("failed to render template page {page}: {message}")]
    Failed { page: String, message: String },
}

/// Renders a named template page with a result map as its data.
///
/// The template engine itself lives outside this crate; closures of the form
/// `Fn(&str, &Params, &mut dyn ResponseWriter) -> Result<(), RenderError>`
/// implement the trait.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        page: &str,
        result: &Params,
        out: &mut dyn ResponseWriter,
    ) -> Result<(), RenderError>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Params, &mut dyn ResponseWriter) -> Result<(), RenderError> + Send + Sync,
{
    fn render(
        &self,
        page: &str,
        result: &Params,
        out: &mut dyn ResponseWriter,
    ) -> Result<(), RenderError> {
        self(page, result, out)
    }
}

/// Renderer used when a component has none: every page is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTemplates;

impl TemplateRenderer for NoTemplates {
    fn render(
        &self,
        page: &str,
        _result: &Params,
        _out: &mut dyn ResponseWriter,
    ) -> Result<(), RenderError> {
        Err(RenderError::PageNotFound {
            page: page.to_owned(),
        })
    }
}
