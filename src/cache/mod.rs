//! Caching layer: memoizes action results per component, action, and
//! cache parameters.
//!
//! - [`derive_key`] / [`CacheDescriptor`]: deterministic keys and per-request settings.
//! - [`CacheStore`]: storage backend trait, with [`MemoryCacheStore`] and
//!   [`FileCacheStore`] implementations.
//! - [`CacheGateway`]: read-through wrapper that runs an action only on a miss.
//! - [`Clock`]: time source for expiry; [`ManualClock`] lets tests move time.

mod clock;
mod file;
mod gateway;
mod key;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileCacheStore;
pub use gateway::{CacheGateway, CacheResult, CacheSource, TEMPLATE_PAGE_KEY};
pub use key::{CacheDescriptor, derive_key, storage_path};
pub use store::{CacheError, CacheStore, MemoryCacheStore};
