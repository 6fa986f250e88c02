//! Action results and the name → handler registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::context::{Params, RequestContext};

/// Action name used when the request does not name one.
pub const DEFAULT_ACTION: &str = "Start";

/// An error reported by an action, distinct from "no result".
#[derive(Debug, Clone, PartialEq)]
pub struct ActionError {
    message: String,
    details: Option<Value>,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Attaches extra data rendered next to the message.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The payload rendered for this error: `{"status": "error", "message": ..}`
    /// plus `details` when present.
    pub fn to_payload(&self) -> Params {
        let mut payload = Params::new();
        payload.insert("status".into(), json!("error"));
        payload.insert("message".into(), json!(self.message));
        if let Some(details) = &self.details {
            payload.insert("details".into(), details.clone());
        }
        payload
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActionError {}

/// What an action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// A result map; rendered as template context or JSON body.
    Data(Params),
    /// No result. Renders as an empty template context or `{}`.
    Empty,
    /// The action failed; renders an error payload.
    Error(ActionError),
}

impl ActionOutcome {
    /// Wraps a JSON value. Objects become [`Data`](Self::Data); `null` and
    /// `false` become [`Empty`](Self::Empty); any other value is placed
    /// under a `"value"` key.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Data(map),
            Value::Null | Value::Bool(false) => Self::Empty,
            other => {
                let mut map = Params::new();
                map.insert("value".into(), other);
                Self::Data(map)
            }
        }
    }

    /// `true` for a result worth storing: non-empty data.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Data(map) if !map.is_empty())
    }
}

impl From<Params> for ActionOutcome {
    fn from(map: Params) -> Self {
        Self::Data(map)
    }
}

impl From<ActionError> for ActionOutcome {
    fn from(err: ActionError) -> Self {
        Self::Error(err)
    }
}

impl<E: Into<ActionError>> From<Result<Params, E>> for ActionOutcome {
    fn from(result: Result<Params, E>) -> Self {
        match result {
            Ok(map) => Self::Data(map),
            Err(e) => Self::Error(e.into()),
        }
    }
}

/// Type-erased action handler.
///
/// Handlers receive the request context mutably so they can pick a template
/// page. In practice you never construct this type directly; use
/// [`ActionRegistry::register`].
pub type Action = Arc<dyn Fn(&mut RequestContext) -> ActionOutcome + Send + Sync + 'static>;

/// Conversion trait for action functions.
///
/// Any `Fn(&mut RequestContext) -> impl Into<ActionOutcome>` that is
/// `Send + Sync + 'static` implements this automatically.
pub trait IntoAction: Send + Sync + 'static {
    fn call(&self, ctx: &mut RequestContext) -> ActionOutcome;
}

impl<T, O> IntoAction for T
where
    T: Fn(&mut RequestContext) -> O + Send + Sync + 'static,
    O: Into<ActionOutcome>,
{
    fn call(&self, ctx: &mut RequestContext) -> ActionOutcome {
        (self)(ctx).into()
    }
}

/// Explicit mapping from action name to handler, filled in by the concrete
/// component when it is built.
///
/// Names match exactly. Registering a name twice replaces the earlier handler.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use rcomp::component::{ActionOutcome, ActionRegistry};
/// use rcomp::context::{ComponentIdentity, Params, RequestContext};
///
/// let mut actions = ActionRegistry::new();
/// actions.register("Start", |_ctx: &mut RequestContext| {
///     ActionOutcome::from_value(json!({"hello": "world"}))
/// });
///
/// let mut ctx = RequestContext::new(
///     ComponentIdentity::new("yokel", "widget"),
///     "Start",
///     false,
///     Params::new(),
/// );
/// assert!(matches!(actions.dispatch("Start", &mut ctx), ActionOutcome::Data(_)));
/// assert_eq!(actions.dispatch("Missing", &mut ctx), ActionOutcome::Empty);
/// ```
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, action: impl IntoAction) {
        let action: Action = Arc::new(move |ctx: &mut RequestContext| action.call(ctx));
        self.actions.insert(name.into(), action);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the handler registered under `name`.
    ///
    /// An unknown name is not an error: it yields [`ActionOutcome::Empty`].
    pub fn dispatch(&self, name: &str, ctx: &mut RequestContext) -> ActionOutcome {
        match self.actions.get(name) {
            Some(action) => action(ctx),
            None => {
                debug!(component = %ctx.identity(), action = name, "no handler registered for action");
                ActionOutcome::Empty
            }
        }
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
