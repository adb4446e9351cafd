//! Authentication session and refresh-token lifecycle engine.
//!
//! The crate owns the state machines behind sign-in (with lockout and
//! anti-enumeration guarantees), optional two-factor authentication,
//! session issuance and revocation, and single-use refresh-token rotation
//! with a bounded grace window and theft detection. HTTP routing, rate
//! limiting, and transport concerns live outside this crate and talk to it
//! through [`services::AuthService`].

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod repositories;
pub mod services;
pub mod types;
pub mod utils;
