use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::scheduling::{Busy, Interval};

#[derive(Debug, Clone, Serialize)]
pub struct SlotConflictBody {
    pub conflict_with: Busy,
    pub alternatives: Vec<Interval>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("requested slot is not available")]
    SlotTaken(SlotConflictBody),
    #[error("requested slot is outside opening hours")]
    OutsideHours,
}

impl ApiError {
    pub fn validation(err: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(format!("validation failed: {err}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::OutsideHours => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SlotTaken(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Db(err) => {
                log::error!("Database error: {err:?}");
                HttpResponse::InternalServerError().json(json!({ "error": "internal error" }))
            }
            ApiError::SlotTaken(body) => HttpResponse::Conflict().json(json!({
                "error": self.to_string(),
                "conflict_with": body.conflict_with,
                "alternatives": body.alternatives,
            })),
            other => HttpResponse::build(self.status_code())
                .json(json!({ "error": other.to_string() })),
        }
    }
}
