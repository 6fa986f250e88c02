//! Per-request context: the resolved action, AJAX origin, and input
//! parameters a component works with while serving one request.

use std::fmt;

use serde_json::{Map, Value};

/// String-keyed parameter map used for request input, cache parameters, and
/// action results.
pub type Params = Map<String, Value>;

/// Template page rendered when neither the action nor a cached result picked one.
pub const DEFAULT_TEMPLATE_PAGE: &str = "template";

/// Namespace used by [`ComponentIdentity::with_default_namespace`].
pub const DEFAULT_NAMESPACE: &str = "yokel";

/// Uniquely identifies a component type as a `(namespace, name)` pair.
///
/// The name is stored lower-cased, so `Widget` and `widget` name the same
/// component.
///
/// # Examples
///
/// ```
/// use rcomp::context::ComponentIdentity;
///
/// let id = ComponentIdentity::new("yokel", "Widget");
/// assert_eq!(id.name(), "widget");
/// assert_eq!(id.to_string(), "yokel:widget");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentIdentity {
    namespace: String,
    name: String,
}

impl ComponentIdentity {
    pub fn new(namespace: impl Into<String>, name: impl AsRef<str>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.as_ref().to_lowercase(),
        }
    }

    /// Identity in the default `yokel` namespace.
    pub fn with_default_namespace(name: impl AsRef<str>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if a request's `component` field addresses this component.
    ///
    /// Both the bare name and the qualified `namespace:name` form are accepted,
    /// compared case-insensitively.
    pub fn is_addressed_by(&self, target: &str) -> bool {
        let target = target.trim();
        match target.split_once(':') {
            Some((ns, name)) => {
                ns.eq_ignore_ascii_case(&self.namespace) && name.eq_ignore_ascii_case(&self.name)
            }
            None => target.eq_ignore_ascii_case(&self.name),
        }
    }
}

impl fmt::Display for ComponentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// State of one request as seen by a component.
#[derive(Debug, Clone)]
pub struct RequestContext {
    identity: ComponentIdentity,
    action: String,
    is_ajax: bool,
    params: Params,
    template_page: String,
}

impl RequestContext {
    pub fn new(
        identity: ComponentIdentity,
        action: impl Into<String>,
        is_ajax: bool,
        params: Params,
    ) -> Self {
        Self {
            identity,
            action: action.into(),
            is_ajax,
            params,
            template_page: String::new(),
        }
    }

    pub fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    /// The resolved action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// `true` when the response produced for this request is the whole HTTP
    /// response rather than a fragment of a larger page.
    pub fn is_ajax(&self) -> bool {
        self.is_ajax
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns a string input parameter, if present.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// The template page explicitly selected for this request; empty means default.
    pub fn template_page(&self) -> &str {
        &self.template_page
    }

    /// The page to render: the selected one, or [`DEFAULT_TEMPLATE_PAGE`].
    pub fn effective_template_page(&self) -> &str {
        if self.template_page.is_empty() {
            DEFAULT_TEMPLATE_PAGE
        } else {
            &self.template_page
        }
    }

    pub fn set_template_page(&mut self, page: impl Into<String>) {
        self.template_page = page.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_lowercases_name() {
        let id = ComponentIdentity::new("yokel", "NewsList");
        assert_eq!(id.namespace(), "yokel");
        assert_eq!(id.name(), "newslist");
        assert_eq!(id.to_string(), "yokel:newslist");
    }

    #[test]
    fn identity_addressing() {
        let id = ComponentIdentity::with_default_namespace("widget");
        assert!(id.is_addressed_by("widget"));
        assert!(id.is_addressed_by("Widget"));
        assert!(id.is_addressed_by("yokel:WIDGET"));
        assert!(!id.is_addressed_by("other:widget"));
        assert!(!id.is_addressed_by("gadget"));
        assert!(!id.is_addressed_by(""));
    }

    #[test]
    fn template_page_defaults() {
        let id = ComponentIdentity::with_default_namespace("widget");
        let mut ctx = RequestContext::new(id, "Start", false, Params::new());
        assert_eq!(ctx.template_page(), "");
        assert_eq!(ctx.effective_template_page(), DEFAULT_TEMPLATE_PAGE);

        ctx.set_template_page("list");
        assert_eq!(ctx.effective_template_page(), "list");
    }

    #[test]
    fn param_str_only_returns_strings() {
        let mut params = Params::new();
        params.insert("id".into(), Value::from("7"));
        params.insert("n".into(), Value::from(3));
        let ctx = RequestContext::new(
            ComponentIdentity::with_default_namespace("w"),
            "Start",
            false,
            params,
        );
        assert_eq!(ctx.param_str("id"), Some("7"));
        assert_eq!(ctx.param_str("n"), None);
        assert_eq!(ctx.param_str("missing"), None);
    }
}
