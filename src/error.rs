use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while turning a request into a mesh. Only
/// `Validation` is the client's fault; the rest reach the client as a 500.
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried no image
    #[error("No image provided")]
    Validation,

    /// The request body is not a JSON object with a string `image`
    #[error("invalid request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// The image URL could not be fetched
    #[error("failed to fetch image: {0}")]
    Fetch(String),

    /// Bad base64, a data URL without payload, or unreadable image bytes
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The generation capability failed or is unavailable
    #[error("mesh generation failed: {0}")]
    Generation(String),

    /// The mesh could not be serialized
    #[error("failed to export mesh: {0}")]
    Export(String),
}

impl Error {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation => "validation",
            Error::MalformedBody(_) => "malformed_body",
            Error::Fetch(_) => "fetch",
            Error::Decode(_) => "decode",
            Error::Generation(_) => "generation",
            Error::Export(_) => "export",
        }
    }

    pub fn generation(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line
        Error::Generation(format!("{err:#}"))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(format!("invalid base64: {err}"))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // reqwest keeps the interesting part (refused, dns, tls) in the source chain
        let mut msg = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            msg.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        Error::Fetch(msg)
    }
}
