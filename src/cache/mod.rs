//! 响应缓存模块：请求指纹与有界、带过期时间的响应缓存。
//!
//! # Response Caching Module
//!
//! Successful results of guarded operations are kept for a short time so that
//! repeated identical requests never reach the remote dependency.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestDescriptor`] | Semantic parameters of a request |
//! | [`Fingerprinter`] | Derives a stable [`Fingerprint`] from a descriptor |
//! | [`ResponseCache`] | Capacity-bounded store with lazy TTL expiry |
//! | [`CacheConfig`] | Enable flag, TTL and capacity |
//!
//! ## Example
//!
//! ```rust
//! use ai_guard_rust::cache::{CacheConfig, Fingerprinter, RequestDescriptor, ResponseCache};
//! use std::time::Duration;
//!
//! let cache: ResponseCache<String> =
//!     ResponseCache::new(&CacheConfig::new().with_ttl(Duration::from_secs(30)));
//! let request = RequestDescriptor::new("two boiled eggs").with_model("m1");
//! let key = Fingerprinter::new().fingerprint(&request);
//!
//! cache.put(key.clone(), "150 kcal".to_string(), request);
//! assert_eq!(cache.get(&key).as_deref(), Some("150 kcal"));
//! ```
//!
//! Eviction is by insertion order, not by access: a frequently read entry is
//! still evicted once it is the oldest.

mod key;
mod manager;

pub use key::{Fingerprint, Fingerprinter, RequestDescriptor};
pub use manager::{CacheConfig, CacheEntry, CacheStats, ResponseCache};
