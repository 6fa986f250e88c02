//! Request-driven components.
//!
//! A [`RequestHandler`] serves one component. Per request it:
//!
//! 1. resolves the action name ([`resolve_action`], default `"Start"`),
//! 2. asks its [`AccessGuard`] whether the action may run,
//! 3. looks the result up through the [`CacheGateway`], dispatching to the
//!    registered action on a miss,
//! 4. writes the result as HTML (through a [`TemplateRenderer`]) or JSON.
//!
//! The returned [`Completion`] tells the host whether the response is
//! finished or is a fragment of a larger page.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use rcomp::component::{ActionOutcome, BufferedWriter, ComponentConfig, RequestHandler, ResultFormat};
//! use rcomp::context::{ComponentIdentity, RequestContext};
//! use rcomp::http::Request;
//!
//! let handler = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
//!     .config(ComponentConfig::default().with_format(ResultFormat::Json))
//!     .action("Start", |_ctx: &mut RequestContext| ActionOutcome::from_value(json!({"count": 1})))
//!     .build();
//!
//! let (request, _) = Request::parse(b"GET /widget HTTP/1.1\r\n\r\n").unwrap();
//! let mut out = BufferedWriter::new();
//! let done = handler.execute(&request, &mut out).unwrap();
//! assert!(done.is_finished());
//! assert_eq!(out.body(), br#"{"count":1}"#);
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::cache::{CacheDescriptor, CacheGateway, CacheStore, MemoryCacheStore};
use crate::context::{ComponentIdentity, Params, RequestContext};
use crate::http::{Request, Response, StatusCode};

mod actions;
mod config;
mod guard;
mod render;
pub mod responder;
mod writer;

pub use actions::{Action, ActionError, ActionOutcome, ActionRegistry, DEFAULT_ACTION, IntoAction};
pub use config::{ComponentConfig, ConfigError, ResultFormat};
pub use guard::{AccessGuard, ActionAllowList, AllowAll};
pub use render::{NoTemplates, RenderError, TemplateRenderer};
pub use writer::{BufferedWriter, Completion, ResponseWriter};

/// Input field naming the action to run.
pub const ACTION_PARAM: &str = "action";

/// Input field naming the component an AJAX request is addressed to.
pub const COMPONENT_PARAM: &str = "component";

/// Errors that abort writing a component's response.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Picks the action name from the input parameters.
///
/// A missing, `null`, or empty `action` yields [`DEFAULT_ACTION`]. Numbers
/// are used in their decimal form; other non-string values fall back to the
/// default. The name is not checked against registered actions here.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use rcomp::component::resolve_action;
///
/// let params = json!({"action": "List"});
/// assert_eq!(resolve_action(params.as_object().unwrap()), "List");
/// assert_eq!(resolve_action(&Default::default()), "Start");
/// ```
pub fn resolve_action(params: &Params) -> String {
    match params.get(ACTION_PARAM) {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => DEFAULT_ACTION.to_owned(),
    }
}

type CacheParamsFn = dyn Fn(&RequestContext) -> Params + Send + Sync;

/// Default cache parameters: every input field except the routing ones.
fn input_cache_params(ctx: &RequestContext) -> Params {
    ctx.params()
        .iter()
        .filter(|(k, _)| k.as_str() != ACTION_PARAM && k.as_str() != COMPONENT_PARAM)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// A component: a named set of actions with caching and output settings.
///
/// Built once with [`RequestHandler::builder`] and shared across requests;
/// it holds no per-request state.
pub struct RequestHandler {
    identity: ComponentIdentity,
    config: ComponentConfig,
    actions: ActionRegistry,
    guard: Arc<dyn AccessGuard>,
    gateway: CacheGateway,
    renderer: Arc<dyn TemplateRenderer>,
    cache_params: Arc<CacheParamsFn>,
}

impl RequestHandler {
    pub fn builder(identity: ComponentIdentity) -> RequestHandlerBuilder {
        RequestHandlerBuilder::new(identity)
    }

    pub fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        self.gateway.store()
    }

    /// Builds the request context: input parameters, resolved action, and
    /// AJAX origin.
    ///
    /// A request counts as AJAX only when it carries
    /// `X-Requested-With: XMLHttpRequest` *and* its `component` field names
    /// this component.
    pub fn context_for(&self, request: &Request) -> RequestContext {
        let params = request.input_params();
        let action = resolve_action(&params);
        let addressed = params
            .get(COMPONENT_PARAM)
            .and_then(Value::as_str)
            .is_some_and(|target| self.identity.is_addressed_by(target));
        let is_ajax = addressed && request.is_ajax();

        RequestContext::new(self.identity.clone(), action, is_ajax, params)
    }

    /// The cache descriptor for a request context.
    pub fn cache_descriptor(&self, ctx: &RequestContext) -> CacheDescriptor {
        if !self.config.cache_enabled {
            return CacheDescriptor::disabled();
        }
        let cache_params = (self.cache_params)(ctx);
        CacheDescriptor::new(&self.identity, ctx.action(), &cache_params, &self.config)
    }

    /// Serves `request`, writing the response to `out`.
    ///
    /// # Errors
    ///
    /// Propagates template and serialization failures from the responder.
    /// Cache store failures are not errors; see [`CacheGateway`].
    pub fn execute(
        &self,
        request: &Request,
        out: &mut dyn ResponseWriter,
    ) -> Result<Completion, ComponentError> {
        self.run(self.context_for(request), out)
    }

    /// Serves an already-built context. Useful for hosts that do not speak HTTP.
    pub fn run(
        &self,
        mut ctx: RequestContext,
        out: &mut dyn ResponseWriter,
    ) -> Result<Completion, ComponentError> {
        debug!(
            component = %self.identity,
            action = ctx.action(),
            ajax = ctx.is_ajax(),
            "executing component"
        );

        if !self.guard.is_action_allowed(ctx.action(), &ctx) {
            debug!(component = %self.identity, action = ctx.action(), "action not allowed");
            return responder::render_forbidden(&ctx, self.config.result_format, out);
        }

        let descriptor = self.cache_descriptor(&ctx);
        let action = ctx.action().to_owned();
        let result = self
            .gateway
            .get_or_compute(&descriptor, &mut ctx, |ctx| self.actions.dispatch(&action, ctx));

        debug!(
            component = %self.identity,
            action = %action,
            source = ?result.source,
            "action result ready"
        );

        responder::render(
            &result.outcome,
            &ctx,
            self.config.result_format,
            self.renderer.as_ref(),
            out,
        )
    }

    /// Serves `request` into a fresh buffer and returns it as an HTTP response.
    ///
    /// Rendering failures become `500 Internal Server Error`.
    pub fn respond(&self, request: &Request) -> Response {
        let mut out = BufferedWriter::new();
        match self.execute(request, &mut out) {
            Ok(_) => out.into_response(),
            Err(e) => {
                error!(component = %self.identity, error = %e, "component failed");
                Response::new(StatusCode::InternalServerError)
                    .body("Internal Server Error")
                    .keep_alive(false)
            }
        }
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestHandler`].
///
/// Defaults: [`ComponentConfig::default`], no actions, [`AllowAll`],
/// a [`MemoryCacheStore`], [`NoTemplates`], and cache parameters taken from
/// the request input (minus `action` and `component`).
pub struct RequestHandlerBuilder {
    identity: ComponentIdentity,
    config: ComponentConfig,
    actions: ActionRegistry,
    guard: Arc<dyn AccessGuard>,
    store: Option<Arc<dyn CacheStore>>,
    renderer: Arc<dyn TemplateRenderer>,
    cache_params: Arc<CacheParamsFn>,
}

impl RequestHandlerBuilder {
    fn new(identity: ComponentIdentity) -> Self {
        Self {
            identity,
            config: ComponentConfig::default(),
            actions: ActionRegistry::new(),
            guard: Arc::new(AllowAll),
            store: None,
            renderer: Arc::new(NoTemplates),
            cache_params: Arc::new(input_cache_params),
        }
    }

    #[must_use]
    pub fn config(mut self, config: ComponentConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers `handler` under `name`.
    #[must_use]
    pub fn action(mut self, name: impl Into<String>, handler: impl IntoAction) -> Self {
        self.actions.register(name, handler);
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn guard(mut self, guard: impl AccessGuard + 'static) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    #[must_use]
    pub fn cache_store(mut self, store: impl CacheStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Uses a store shared with other components.
    #[must_use]
    pub fn shared_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Replaces how cache parameters are derived from a request.
    #[must_use]
    pub fn cache_params<F>(mut self, derive: F) -> Self
    where
        F: Fn(&RequestContext) -> Params + Send + Sync + 'static,
    {
        self.cache_params = Arc::new(derive);
        self
    }

    pub fn build(self) -> RequestHandler {
        let store: Arc<dyn CacheStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryCacheStore::new()),
        };

        RequestHandler {
            identity: self.identity,
            config: self.config,
            actions: self.actions,
            guard: self.guard,
            gateway: CacheGateway::from_shared(store),
            renderer: self.renderer,
            cache_params: self.cache_params,
        }
    }
}
