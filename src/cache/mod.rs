//! In-memory caching for content fetched from the posts API.
//!
//! - [`TtlStore`]: expiring key/value map behind one read/write lock
//! - [`InFlight`]: optional per-key guard that collapses concurrent misses
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 36000
//! single_flight = false
//! ```

mod config;
mod flight;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use flight::{FlightGuard, InFlight};
pub use keys::PostsPageKey;
pub use store::{CacheEntry, METRIC_CACHE_HIT, METRIC_CACHE_MISS, TtlStore};
