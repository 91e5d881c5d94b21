//! Collaborator contracts consumed by the reminder engine.
//!
//! # Responsibility
//! - Describe the notification scheduler, durable key-value store, remote
//!   data queries and URL signer as minimal async traits.
//! - Keep SDK-specific types out of core so fakes can stand in for tests.
//!
//! # Invariants
//! - Collaborator failures are reported as `CollabError`, never panics.
//! - `NotificationScheduler::cancel` succeeds for unknown handles.

pub mod error;
pub mod kv;
pub mod memory;
pub mod notifier;
pub mod remote;
pub mod signer;

pub use error::{CollabError, CollabResult};
pub use kv::KeyValueStore;
pub use notifier::{
    NotificationContent, NotificationData, NotificationScheduler, PendingNotification,
    PermissionStatus,
};
pub use remote::{CandidateQuery, CouponSource, SettingsSource};
pub use signer::UrlSigner;
