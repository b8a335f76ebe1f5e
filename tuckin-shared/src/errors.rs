use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E3xxx: Matching and voting errors
/// - E4xxx: Dining event errors
/// - E5xxx: Rating errors
/// - E6xxx: Scheduler errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    PreconditionFailed,
    TransientStore,
    InvalidDate,

    // Matching (E3xxx)
    GroupNotFound,
    NotGroupMember,
    RestaurantNotFound,
    VotingClosed,
    AlreadyVoted,
    NoCandidates,
    NoOpenRestaurants,

    // Dining (E4xxx)
    EventNotFound,
    InvalidEventStatus,
    CandidatesExhausted,

    // Rating (E5xxx)
    RatingSessionInvalid,
    RatingSessionExpired,

    // Scheduler (E6xxx)
    UnknownTaskType,
}

/// Coarse classification used by batch routines to decide whether to skip,
/// abort, or record a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    Forbidden,
    Unauthorized,
    NoCandidates,
    NoOpenRestaurants,
    InvalidInput,
    TransientStore,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",
            Self::PreconditionFailed => "E0007",
            Self::TransientStore => "E0008",
            Self::InvalidDate => "E0009",

            // Matching
            Self::GroupNotFound => "E3001",
            Self::NotGroupMember => "E3002",
            Self::RestaurantNotFound => "E3003",
            Self::VotingClosed => "E3004",
            Self::AlreadyVoted => "E3005",
            Self::NoCandidates => "E3006",
            Self::NoOpenRestaurants => "E3007",

            // Dining
            Self::EventNotFound => "E4001",
            Self::InvalidEventStatus => "E4002",
            Self::CandidatesExhausted => "E4003",

            // Rating
            Self::RatingSessionInvalid => "E5001",
            Self::RatingSessionExpired => "E5002",

            // Scheduler
            Self::UnknownTaskType => "E6001",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound | Self::GroupNotFound | Self::RestaurantNotFound | Self::EventNotFound => {
                ErrorKind::NotFound
            }
            Self::PreconditionFailed | Self::VotingClosed | Self::AlreadyVoted
            | Self::InvalidEventStatus | Self::CandidatesExhausted
            | Self::RatingSessionExpired => ErrorKind::PreconditionFailed,
            Self::Forbidden | Self::NotGroupMember | Self::RatingSessionInvalid => ErrorKind::Forbidden,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::NoCandidates => ErrorKind::NoCandidates,
            Self::NoOpenRestaurants => ErrorKind::NoOpenRestaurants,
            Self::ValidationError | Self::BadRequest | Self::UnknownTaskType => ErrorKind::InvalidInput,
            Self::InternalError | Self::TransientStore | Self::InvalidDate => ErrorKind::TransientStore,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::InvalidDate => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TransientStore => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoCandidates | Self::NoOpenRestaurants => StatusCode::CONFLICT,
            _ => match self.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::PreconditionFailed | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PreconditionFailed, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransientStore, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code, if this is a known domain error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == Some(code)
    }

    /// Unknown failures (database, pool, anyhow) all surface as `TransientStore`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Known { code, .. } => code.kind(),
            AppError::Database(diesel::result::Error::NotFound) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::InvalidInput,
            AppError::Internal(_) | AppError::Database(_) | AppError::Pool(_) => ErrorKind::TransientStore,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if status.is_server_error() {
                    tracing::error!(code = code.code(), "{message}");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ApiErrorResponse::new("E0008", "database error"),
                    ),
                }
            }
            AppError::Pool(err) => {
                tracing::error!(error = %err, "connection pool error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiErrorResponse::new("E0008", "database unavailable"),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
