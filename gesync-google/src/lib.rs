//! Google Calendar target for gesync.
//!
//! Talks to the Calendar v3 REST API directly: calendar list lookup,
//! tagged event listing, and `multipart/mixed` batches for deletes and
//! inserts. Also owns the OAuth client config and the stored session.

pub mod api;
pub mod app_config;
pub mod auth;
pub mod batch;
pub mod calendar;
pub mod convert;
pub mod directory;
pub mod mirror;
pub mod session;
pub mod types;

pub use app_config::{AppCredentials, config_root};
pub use calendar::{GoogleAccount, GoogleCalendar};
pub use session::GoogleSession;
