//! Cache key derivation and the per-request [`CacheDescriptor`].

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::component::ComponentConfig;
use crate::context::{ComponentIdentity, Params};

/// Derives the cache key for one `(identity, action, cache params)` triple.
///
/// The key is the hex SHA-256 of the qualified component name, the action
/// name, and the JSON encoding of `cache_params`. [`Params`] keeps its keys
/// sorted, so two maps with the same entries hash the same regardless of
/// insertion order.
///
/// # Examples
///
/// ```
/// use rcomp::cache::derive_key;
/// use rcomp::context::{ComponentIdentity, Params};
///
/// let id = ComponentIdentity::new("yokel", "widget");
/// let a = derive_key(&id, "Start", &Params::new());
/// let b = derive_key(&id, "Start", &Params::new());
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn derive_key(identity: &ComponentIdentity, action: &str, cache_params: &Params) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.to_string().as_bytes());
    // Separators keep ("ab", "c") and ("a", "bc") apart.
    hasher.update([0u8]);
    hasher.update(action.as_bytes());
    hasher.update([0u8]);
    // A map of `Value`s always serializes.
    let encoded = serde_json::to_vec(cache_params).unwrap_or_default();
    hasher.update(&encoded);
    hex::encode(hasher.finalize())
}

/// Storage namespace for a component: `/{namespace:name}` or
/// `/{namespace:name}/{cache_dir}`.
pub fn storage_path(identity: &ComponentIdentity, cache_dir: Option<&str>) -> String {
    match cache_dir.map(|d| d.trim_matches('/')).filter(|d| !d.is_empty()) {
        Some(dir) => format!("/{identity}/{dir}"),
        None => format!("/{identity}"),
    }
}

/// Everything the cache gateway needs to serve one request.
///
/// Built fresh per request from the component configuration and the request
/// context; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDescriptor {
    pub key: String,
    pub ttl: Duration,
    pub storage_path: String,
    pub enabled: bool,
}

impl CacheDescriptor {
    pub fn new(
        identity: &ComponentIdentity,
        action: &str,
        cache_params: &Params,
        config: &ComponentConfig,
    ) -> Self {
        Self {
            key: derive_key(identity, action, cache_params),
            ttl: Duration::from_secs(config.cache_time),
            storage_path: storage_path(identity, config.cache_dir.as_deref()),
            enabled: config.cache_enabled,
        }
    }

    /// A descriptor that bypasses the store entirely.
    pub fn disabled() -> Self {
        Self {
            key: String::new(),
            ttl: Duration::ZERO,
            storage_path: String::new(),
            enabled: false,
        }
    }
}
