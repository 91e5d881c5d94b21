//! Coupon image references and signed-URL resolution.
//!
//! # Responsibility
//! - Normalize whatever a coupon row stores (raw key, public URL, signed URL)
//!   into a storage key.
//! - Resolve keys to time-limited signed URLs through a TTL cache that
//!   batches and coalesces signing calls.
//!
//! # Invariants
//! - A cached URL is only served while `now < expires_at`.
//! - Concurrent requests for one key share a single signing call.

pub mod signed_url_cache;
pub mod storage_key;
