//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod config;
pub mod gemini;
pub mod locks;
pub mod oracle;
pub mod persistence;
pub mod ports;
pub mod resilient_llm;
