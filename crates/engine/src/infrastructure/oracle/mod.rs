//! Decision oracle adapters.
//!
//! [`RemoteOracle`] asks a text-generation service; [`FallbackOracle`] answers
//! deterministically. `OracleError` never leaves this module's public trait
//! methods: every failure degrades to the fallback.

use std::time::Duration;

use crate::infrastructure::ports::LlmError;

mod fallback;
pub mod prompt_templates;
mod remote;
pub mod response_parser;

pub use fallback::{FallbackOracle, FALLBACK_REASONING};
pub use prompt_templates::PromptTemplates;
pub use remote::RemoteOracle;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("empty response")]
    Empty,
    #[error("no JSON object in response")]
    NoJson,
    #[error("malformed JSON: {0}")]
    Malformed(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("action '{0}' was not offered")]
    ActionNotOffered(String),
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Llm(#[from] LlmError),
}
