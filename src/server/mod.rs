//! The HTTP front end: routes, CORS, and the mapping from [`Error`] to responses

use crate::error::Error;
use crate::worker::Worker;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, HttpResponse};
use tracing::{error, warn};

pub mod protocol;
pub mod routes;

/// Methods advertised to browsers and in preflight answers
pub const ALLOWED_METHODS: &str = "GET,POST,OPTIONS";

/// Process-wide state shared by all HTTP workers
pub struct AppState {
    pub worker: Worker,

    /// Client for fetching image URLs
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(worker: Worker) -> Self {
        AppState {
            worker,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug)]
pub struct WebError {
    err: Error,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.err.kind(), "request failed: {}", self.err);
        } else {
            warn!(kind = self.err.kind(), "rejected request: {}", self.err);
        }

        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .json(protocol::ErrorResponse {
                error: self.to_string(),
            })
    }

    fn status_code(&self) -> StatusCode {
        match self.err {
            Error::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for WebError {
    fn from(err: Error) -> WebError {
        WebError { err }
    }
}

/// Permissive CORS headers added to every response
pub fn cors() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
        .add(("Access-Control-Allow-Methods", ALLOWED_METHODS))
}

/// Register the routes. Request bodies are unbounded: images arrive inline.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(usize::MAX))
        .service(routes::index)
        .service(routes::status)
        .service(routes::image2stl)
        .default_service(web::to(routes::fallback));
}
