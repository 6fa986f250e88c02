//! # rcomp
//!
//! Request-driven components over HTTP/1.1: resolve an action from the
//! request, gate it, serve its result from cache or compute it, and write
//! the result as an HTML template or a JSON body.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use rcomp::component::{ActionOutcome, ComponentConfig, RequestHandler, ResultFormat};
//! use rcomp::context::{ComponentIdentity, RequestContext};
//! use rcomp::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let widget = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
//!         .config(ComponentConfig::default().with_cache(true, 60).with_format(ResultFormat::Json))
//!         .action("Start", |_ctx: &mut RequestContext| {
//!             ActionOutcome::from_value(json!({"count": 1}))
//!         })
//!         .build();
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(Arc::new(widget)).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod component;
pub mod context;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use component::{
    ActionOutcome, Completion, ComponentConfig, RequestHandler, ResponseWriter, ResultFormat,
};
pub use context::{ComponentIdentity, RequestContext};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
