//! Flutter-facing bridge over `dotoring_core`.

pub mod api;
