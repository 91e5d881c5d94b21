//! Expiry reminder engine.
//!
//! # Responsibility
//! - Decide which coupons deserve a local reminder and when it fires.
//! - Keep the scheduler and the local schedule store in lockstep, for one
//!   coupon (`ReminderScheduler`) or for the whole account
//!   (`RescheduleCoordinator`).
//!
//! # Invariants
//! - Eligibility is one pure function shared by single and batch paths.
//! - Existing reminders for a coupon are cleared before new ones are created.
//! - A full reschedule never keeps more than `max_scheduled` coupons.

pub mod content;
pub mod eligibility;
pub mod planner;
pub mod reschedule;
pub mod scheduler;
pub mod settings;
