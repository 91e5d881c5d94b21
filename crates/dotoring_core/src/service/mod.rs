//! Use-case entry points for UI event handlers.
//!
//! # Responsibility
//! - Wire collaborators and configuration into one engine instance with a
//!   process-wide lifetime (`DotoringEngine`).
//! - Map coupon lifecycle events (saved, consumed, deleted, image replaced,
//!   logout) onto reminder and URL-cache operations.
//!
//! # Invariants
//! - Callers never mutate the schedule store or URL cache directly.

pub mod coupon_lifecycle;
pub mod engine;
