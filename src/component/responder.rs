//! Writes an action outcome as HTML or JSON.
//!
//! | Format | AJAX | Buffer reset | Finalized | Completion |
//! |--------|------|--------------|-----------|------------|
//! | HTML   | no   | no           | no        | `Continue` |
//! | HTML   | yes  | before render| yes       | `Finished` |
//! | JSON   | any  | yes          | yes       | `Finished` |

use std::borrow::Cow;

use serde_json::json;
use tracing::debug;

use super::ComponentError;
use super::actions::ActionOutcome;
use super::config::ResultFormat;
use super::render::TemplateRenderer;
use super::writer::{Completion, ResponseWriter};
use crate::cache::TEMPLATE_PAGE_KEY;
use crate::context::{Params, RequestContext};
use crate::http::StatusCode;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Renders `outcome` for `ctx` in the configured format.
///
/// # Errors
///
/// - [`ComponentError::Render`]: the template renderer failed (HTML only).
/// - [`ComponentError::Serialization`]: the result could not be encoded (JSON only).
pub fn render(
    outcome: &ActionOutcome,
    ctx: &RequestContext,
    format: ResultFormat,
    renderer: &dyn TemplateRenderer,
    out: &mut dyn ResponseWriter,
) -> Result<Completion, ComponentError> {
    let (status, data) = match outcome {
        ActionOutcome::Data(map) => (StatusCode::Ok, Cow::Borrowed(map)),
        ActionOutcome::Empty => (StatusCode::Ok, Cow::Owned(Params::new())),
        ActionOutcome::Error(err) => (StatusCode::InternalServerError, Cow::Owned(err.to_payload())),
    };

    match format {
        ResultFormat::Html => {
            if ctx.is_ajax() {
                out.reset_buffer();
            }
            if status != StatusCode::Ok {
                out.set_status(status);
            }

            let page = ctx.effective_template_page();
            debug!(component = %ctx.identity(), action = ctx.action(), page, "rendering template");
            renderer.render(page, &data, out)?;

            if ctx.is_ajax() {
                Ok(finish(out))
            } else {
                Ok(Completion::Continue)
            }
        }
        ResultFormat::Json => {
            out.reset_buffer();
            out.set_status(status);
            out.set_header("Content-Type", JSON_CONTENT_TYPE);

            let body = if data.contains_key(TEMPLATE_PAGE_KEY) {
                let mut public = data.into_owned();
                public.remove(TEMPLATE_PAGE_KEY);
                serde_json::to_vec(&public)?
            } else {
                serde_json::to_vec(&*data)?
            };
            out.write(&body);

            Ok(finish(out))
        }
    }
}

/// Writes the response for an action the guard refused.
///
/// The status is always `403 Forbidden`. JSON and AJAX requests get a
/// finalized response (JSON with an error payload, HTML with no body); a
/// plain HTML fragment only sets the status and lets the host continue.
pub fn render_forbidden(
    ctx: &RequestContext,
    format: ResultFormat,
    out: &mut dyn ResponseWriter,
) -> Result<Completion, ComponentError> {
    match format {
        ResultFormat::Json => {
            out.reset_buffer();
            out.set_status(StatusCode::Forbidden);
            out.set_header("Content-Type", JSON_CONTENT_TYPE);
            let body = serde_json::to_vec(&json!({
                "status": "error",
                "message": "action not allowed",
            }))?;
            out.write(&body);
            Ok(finish(out))
        }
        ResultFormat::Html if ctx.is_ajax() => {
            out.reset_buffer();
            out.set_status(StatusCode::Forbidden);
            Ok(finish(out))
        }
        ResultFormat::Html => {
            out.set_status(StatusCode::Forbidden);
            Ok(Completion::Continue)
        }
    }
}

fn finish(out: &mut dyn ResponseWriter) -> Completion {
    out.flush();
    out.finalize();
    Completion::Finished
}
