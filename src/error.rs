use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;
use thiserror::Error;

/// The single error taxonomy for the whole API. Every route handler and every
/// piece of business logic underneath it returns `Result<T, ApiError>` rather
/// than ad-hoc status/body tuples, so there is exactly one place that decides
/// how a failure looks on the wire.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UpstreamFetch(String),

    #[error("{0}")]
    Invariant(String),
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::BadInput(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::UpstreamFetch(_) => Status::BadGateway,
            ApiError::Invariant(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
