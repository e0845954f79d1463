use crate::worker::WorkerStatus;
use serde::{Deserialize, Serialize};

/// Body of `POST /image2stl`. `image` is a URL, a data URL or base64; a
/// missing field and `null` both mean no image.
#[derive(Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub image: Option<String>,
}

impl std::fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.image.as_ref().map(String::len);
        write!(f, "ImageRequest {{ image: <{len:?} bytes> }}")
    }
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusResponse<'a> {
    pub status: WorkerStatus,
    pub backend: &'a str,
    pub queued: usize,
    pub served: u64,
}
