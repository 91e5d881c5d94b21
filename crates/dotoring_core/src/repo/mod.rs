//! Persistence implementations behind the engine.
//!
//! # Responsibility
//! - Provide the durable `KeyValueStore` backed by SQLite.
//! - Maintain the `(coupon, kind) -> handle` schedule table on top of it.
//!
//! # Invariants
//! - Schedule writes always replace: a prior handle is cancelled before the
//!   new one is persisted.
//! - SQL details stay inside `kv_store`.

pub mod kv_store;
pub mod schedule_store;
