//! The user-facing routes. `POST /image2stl` decodes the image in the request
//! handler, queues it on the generation worker, and streams back the STL.

use super::protocol::{ErrorResponse, ImageRequest, StatusResponse};
use super::{AppState, WebError, ALLOWED_METHODS};
use crate::config::{STL_CONTENT_TYPE, STL_FILENAME, USAGE};
use crate::decode;
use crate::error::Error;
use crate::export;
use actix_web::http::header::{self, ContentDisposition, ContentType};
use actix_web::http::Method;
use actix_web::{post, route, web, HttpRequest, HttpResponse, Responder};
use tracing::*;

type Result<T> = std::result::Result<T, WebError>;

/// Overview of the service
#[route("/", method = "GET", method = "HEAD")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .body(USAGE)
}

/// Convert the image in the JSON body into a binary STL
#[post("/image2stl")]
pub async fn image2stl(body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse> {
    // The body is JSON whatever the request's Content-Type says
    let req: ImageRequest = serde_json::from_slice(&body).map_err(Error::from)?;
    let input = req
        .image
        .filter(|image| !image.is_empty())
        .ok_or(Error::Validation)?;

    let image = decode::load_image(&input, &state.client).await?;
    let mesh = state.worker.generate(image).await?;
    let stl = export::to_stl(&mesh)?;

    info!(
        "serving {STL_FILENAME} with {} triangles ({} bytes)",
        mesh.triangle_count(),
        stl.len()
    );

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, STL_CONTENT_TYPE))
        .insert_header(ContentDisposition::attachment(STL_FILENAME))
        .body(stl))
}

/// State of the generation worker
#[route("/status", method = "GET", method = "HEAD")]
pub async fn status(state: web::Data<AppState>) -> impl Responder {
    let worker = &state.worker;
    HttpResponse::Ok().json(StatusResponse {
        status: worker.status(),
        backend: worker.backend(),
        queued: worker.queued(),
        served: worker.served(),
    })
}

/// Methods served on each known path
fn allowed_on(path: &str) -> Option<&'static str> {
    match path {
        "/" | "/status" => Some("GET, HEAD, OPTIONS"),
        "/image2stl" => Some("OPTIONS, POST"),
        _ => None,
    }
}

/// Answers CORS preflights on any path, and wrong methods on known paths
pub async fn fallback(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        let allow = allowed_on(req.path()).unwrap_or(ALLOWED_METHODS);
        return HttpResponse::Ok()
            .insert_header((header::ALLOW, allow))
            .finish();
    }

    if let Some(allow) = allowed_on(req.path()) {
        debug!("{} not allowed on {}", req.method(), req.path());
        return HttpResponse::MethodNotAllowed()
            .insert_header((header::ALLOW, allow))
            .insert_header(ContentType::json())
            .json(ErrorResponse {
                error: "Method Not Allowed".into(),
            });
    }

    debug!("no route for {} {}", req.method(), req.path());
    HttpResponse::NotFound()
        .insert_header(ContentType::json())
        .json(ErrorResponse {
            error: "Not Found".into(),
        })
}
