//! Hero Tycoon Engine library.
//!
//! This crate contains the server process for Hero Tycoon.
//!
//! ## Structure
//!
//! - `use_cases/` - Transaction boundaries: load, resolve, commit, broadcast
//! - `infrastructure/` - Ports and their adapters (row stores, text generation, clock/random)
//! - `api/` - HTTP and WebSocket entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
