//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Row storage (in-memory or SQLite)
//! - Text generation (Gemini, or nothing)
//! - The decision oracle (remote or deterministic fallback)
//! - Realtime delivery (WebSocket rooms)
//! - Clock/Random (for testing)

mod error;
mod external;
mod oracle;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{
    CommitVersions, GuildRepo, HeroRepo, ResolutionCommit, ResolutionStore, Versioned, WorldRepo,
};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    ChatMessage, FinishReason, LlmPort, LlmRequest, LlmResponse, MessageRole, RealtimePort,
    TokenUsage,
};

// =============================================================================
// Decision Oracle
// =============================================================================
pub use oracle::{
    DecisionContext, DecisionOracle, DecisionSource, DescribeKind, DescribeSubject, HeroDecision,
    HeroView,
};

// =============================================================================
// Testability Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{LlmError, RepoError};

// =============================================================================
// Mock re-exports (test only)
// =============================================================================
#[cfg(test)]
pub use external::{MockLlmPort, MockRealtimePort};
#[cfg(test)]
pub use oracle::MockDecisionOracle;
#[cfg(test)]
pub use repos::{MockGuildRepo, MockHeroRepo, MockResolutionStore, MockWorldRepo};
#[cfg(test)]
pub use testing::{MockClockPort, MockRandomPort};
