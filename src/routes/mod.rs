//! HTTP route handlers.
//!
//! Each sub-module corresponds to an API endpoint group. Everything is
//! served unauthenticated: the daemon binds a local status surface, not a
//! remote control plane.

pub mod events;
pub mod health;
pub mod tracker;
pub mod ui;
