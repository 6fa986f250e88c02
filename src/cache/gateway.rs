//! Cache-or-compute branching around an action.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::key::CacheDescriptor;
use super::store::CacheStore;
use crate::component::ActionOutcome;
use crate::context::RequestContext;

/// Key under which a cached result records the template page it was rendered with.
pub const TEMPLATE_PAGE_KEY: &str = "templatePage";

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Caching is off for this request; the action ran.
    Disabled,
    /// Served from the store; the action did not run.
    Hit,
    /// Not in the store (or the store failed); the action ran.
    Miss,
}

/// Result from a gateway lookup, with metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult {
    pub outcome: ActionOutcome,
    pub source: CacheSource,
}

/// Wraps an action in a read-through cache.
///
/// Store failures never fail the request: a failed lookup counts as a miss
/// and a failed write is logged and dropped. Two identical requests that miss
/// at the same time both compute and both write; the later write wins.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
}

impl CacheGateway {
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_shared(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Returns the stored result for `descriptor`, or runs `compute` and
    /// stores what it produced.
    ///
    /// - Disabled descriptor: `compute` runs once and its outcome is returned
    ///   untouched; the store is not consulted.
    /// - Hit: the stored map is returned and a recorded template page is
    ///   restored into `ctx`.
    /// - Miss: `compute` runs. Only non-empty [`ActionOutcome::Data`] is
    ///   annotated with the current template page and written back.
    pub fn get_or_compute<F>(
        &self,
        descriptor: &CacheDescriptor,
        ctx: &mut RequestContext,
        compute: F,
    ) -> CacheResult
    where
        F: FnOnce(&mut RequestContext) -> ActionOutcome,
    {
        if !descriptor.enabled {
            return CacheResult {
                outcome: compute(ctx),
                source: CacheSource::Disabled,
            };
        }

        match self.store.get(&descriptor.storage_path, &descriptor.key) {
            Ok(Some(vars)) => {
                debug!(
                    path = %descriptor.storage_path,
                    key = %descriptor.key,
                    "cache hit"
                );
                if let Some(page) = vars.get(TEMPLATE_PAGE_KEY).and_then(Value::as_str) {
                    ctx.set_template_page(page);
                }
                return CacheResult {
                    outcome: ActionOutcome::Data(vars),
                    source: CacheSource::Hit,
                };
            }
            Ok(None) => {
                debug!(path = %descriptor.storage_path, key = %descriptor.key, "cache miss");
            }
            Err(e) => {
                warn!(
                    path = %descriptor.storage_path,
                    key = %descriptor.key,
                    error = %e,
                    "cache lookup failed, computing instead"
                );
            }
        }

        let mut outcome = compute(ctx);
        if !outcome.is_cacheable() {
            return CacheResult {
                outcome,
                source: CacheSource::Miss,
            };
        }

        if let ActionOutcome::Data(vars) = &mut outcome {
            vars.insert(
                TEMPLATE_PAGE_KEY.to_owned(),
                Value::String(ctx.template_page().to_owned()),
            );
            if let Err(e) = self.store.put(
                &descriptor.storage_path,
                &descriptor.key,
                vars,
                descriptor.ttl,
            ) {
                warn!(
                    path = %descriptor.storage_path,
                    key = %descriptor.key,
                    error = %e,
                    "cache write failed, result not stored"
                );
            }
        }

        CacheResult {
            outcome,
            source: CacheSource::Miss,
        }
    }
}
