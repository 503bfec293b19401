//! Mapping use-case errors onto the HTTP and realtime error surfaces.
//!
//! Both surfaces share one classification: bad input, missing entity, game
//! rule refusal, stale state, internal failure. Internal failures are logged
//! in full and replaced with a generic message before leaving the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use herotycoon_domain::{ErrorCategory, ResolutionError};
use herotycoon_shared::{ErrorBody, ErrorCode, ServerMessage};

use crate::infrastructure::ports::RepoError;
use crate::use_cases::guild::GuildOperationError;
use crate::use_cases::hero::HeroActionError;
use crate::use_cases::master::MasterCommandError;
use crate::use_cases::validation::ValidationError;
use crate::use_cases::world::WorldTickError;

/// Common error messages for client consumption.
pub mod messages {
    pub const TRY_AGAIN: &str = "The game state changed while processing the request, please try again";
    pub const INVALID_MESSAGE: &str = "Invalid message format";
    pub const UNKNOWN_EVENT: &str = "Unknown event";
}

/// Log the full error server-side and return a generic message for the client.
pub fn sanitize_error<E: std::fmt::Display>(error: &E, context: &str) -> String {
    tracing::error!(error = %error, context = context, "Internal error occurred");
    format!("An error occurred while {}", context)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// A game rule refused the operation; the message is safe to display.
    Precondition(String),
    Conflict,
    /// Already sanitised.
    Internal(String),
}

impl ApiError {
    fn internal<E: std::fmt::Display>(error: &E, context: &str) -> Self {
        ApiError::Internal(sanitize_error(error, context))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(_) => ErrorCode::BadRequest,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Precondition(_) => ErrorCode::PreconditionFailed,
            ApiError::Conflict => ErrorCode::Conflict,
            ApiError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Precondition(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Conflict => messages::TRY_AGAIN.to_string(),
        }
    }

    /// The realtime `error` event for this failure.
    pub fn into_server_message(self) -> ServerMessage {
        ServerMessage::error(self.code(), self.message())
    }

    fn from_repo(error: RepoError, context: &str) -> Self {
        match error {
            RepoError::Conflict { .. } => ApiError::Conflict,
            RepoError::NotFound { .. } => ApiError::NotFound(error.to_string()),
            other => ApiError::internal(&other, context),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            error: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ResolutionError> for ApiError {
    fn from(e: ResolutionError) -> Self {
        match e.category() {
            ErrorCategory::Precondition => ApiError::Precondition(e.to_string()),
            ErrorCategory::Concurrency => ApiError::Conflict,
        }
    }
}

impl From<HeroActionError> for ApiError {
    fn from(e: HeroActionError) -> Self {
        match e {
            HeroActionError::Validation(e) => e.into(),
            HeroActionError::HeroNotFound(_) => ApiError::NotFound(e.to_string()),
            HeroActionError::Resolution(e) => e.into(),
            HeroActionError::Repo(e) => ApiError::from_repo(e, "processing the hero action"),
        }
    }
}

impl From<GuildOperationError> for ApiError {
    fn from(e: GuildOperationError) -> Self {
        match e {
            GuildOperationError::Validation(e) => e.into(),
            GuildOperationError::GuildNotFound(_) | GuildOperationError::WorldNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            GuildOperationError::Rejected(e) => ApiError::Precondition(e.to_string()),
            GuildOperationError::Repo(e) => ApiError::from_repo(e, "updating the guild"),
        }
    }
}

impl From<WorldTickError> for ApiError {
    fn from(e: WorldTickError) -> Self {
        match e {
            WorldTickError::Validation(e) => e.into(),
            WorldTickError::WorldNotFound(_) | WorldTickError::LocationNotFound { .. } => {
                ApiError::NotFound(e.to_string())
            }
            WorldTickError::Repo(e) => ApiError::from_repo(e, "updating the world"),
        }
    }
}

impl From<MasterCommandError> for ApiError {
    fn from(e: MasterCommandError) -> Self {
        match e {
            MasterCommandError::Validation(e) => e.into(),
            MasterCommandError::Hero(e) => e.into(),
            MasterCommandError::Guild(e) => e.into(),
        }
    }
}
