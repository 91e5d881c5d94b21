//! Domain records the reminder engine reads and persists.
//!
//! # Responsibility
//! - Define typed shapes for coupons, notification settings and schedule rows.
//! - Validate loosely-typed backend records at the boundary.
//!
//! # Invariants
//! - A `Coupon` always carries a non-empty id and a parsed date-only expiry.
//! - `LeadDays` can only hold one of the five allowed offsets.

pub mod coupon;
pub mod schedule;
pub mod settings;
