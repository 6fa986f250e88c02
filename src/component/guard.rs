//! Access guards: decide whether an action may run for a request.

use std::collections::HashSet;

use crate::context::RequestContext;

/// A yes/no gate evaluated after the action is resolved and before anything
/// is computed or read from cache.
///
/// Closures of the form `Fn(&str, &RequestContext) -> bool` implement this
/// trait, so small policies need no dedicated type.
pub trait AccessGuard: Send + Sync {
    fn is_action_allowed(&self, action: &str, ctx: &RequestContext) -> bool;
}

impl<F> AccessGuard for F
where
    F: Fn(&str, &RequestContext) -> bool + Send + Sync,
{
    fn is_action_allowed(&self, action: &str, ctx: &RequestContext) -> bool {
        self(action, ctx)
    }
}

/// Permits every action. This is the default guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGuard for AllowAll {
    fn is_action_allowed(&self, _action: &str, _ctx: &RequestContext) -> bool {
        true
    }
}

/// Permits only the listed action names.
///
/// # Examples
///
/// ```
/// use rcomp::component::{AccessGuard, ActionAllowList};
/// use rcomp::context::{ComponentIdentity, Params, RequestContext};
///
/// let guard = ActionAllowList::new(["Start", "List"]);
/// let ctx = RequestContext::new(ComponentIdentity::new("yokel", "w"), "Delete", false, Params::new());
/// assert!(guard.is_action_allowed("List", &ctx));
/// assert!(!guard.is_action_allowed("Delete", &ctx));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ActionAllowList {
    allowed: HashSet<String>,
}

impl ActionAllowList {
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: actions.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn allow(mut self, action: impl Into<String>) -> Self {
        self.allowed.insert(action.into());
        self
    }
}

impl AccessGuard for ActionAllowList {
    fn is_action_allowed(&self, action: &str, _ctx: &RequestContext) -> bool {
        self.allowed.contains(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ComponentIdentity, Params};

    fn ctx(ajax: bool) -> RequestContext {
        RequestContext::new(
            ComponentIdentity::new("yokel", "widget"),
            "Start",
            ajax,
            Params::new(),
        )
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.is_action_allowed("Anything", &ctx(false)));
    }

    #[test]
    fn allow_list_is_exact() {
        let guard = ActionAllowList::default().allow("Start");
        assert!(guard.is_action_allowed("Start", &ctx(false)));
        assert!(!guard.is_action_allowed("start", &ctx(false)));
        assert!(!guard.is_action_allowed("Delete", &ctx(false)));
    }

    #[test]
    fn closures_are_guards() {
        let ajax_only = |_action: &str, ctx: &RequestContext| ctx.is_ajax();
        assert!(ajax_only.is_action_allowed("Start", &ctx(true)));
        assert!(!ajax_only.is_action_allowed("Start", &ctx(false)));
    }
}
