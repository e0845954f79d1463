//! Turning the `image` field of a request into pixels. The field may be a
//! remote URL, a data URL, or bare base64.

use crate::error::{Error, Result};
use base64::{
    alphabet,
    engine::{self, general_purpose},
    Engine as _,
};
use image::RgbaImage;
use std::borrow::Cow;
use tracing::debug;

/// Standard alphabet, padding optional
const BASE64: engine::GeneralPurpose = engine::GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(engine::DecodePaddingMode::Indifferent),
);

/// Where the bytes of an image live
#[derive(Debug, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// `http://` or `https://` URL to fetch
    Url(&'a str),

    /// `data:<header>,<payload>`; the header is only used to find the payload
    DataUrl { header: &'a str, payload: &'a str },

    /// The whole string is base64
    Base64(&'a str),
}

impl<'a> ImageSource<'a> {
    pub fn parse(input: &'a str) -> Result<Self> {
        if input.starts_with("http://") || input.starts_with("https://") {
            Ok(ImageSource::Url(input))
        } else if let Some(rest) = input.strip_prefix("data:") {
            match rest.split_once(',') {
                Some((header, payload)) => Ok(ImageSource::DataUrl { header, payload }),
                None => Err(Error::Decode("data URL has no ',' before its payload".into())),
            }
        } else {
            Ok(ImageSource::Base64(input))
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ImageSource::Url(_) => "url",
            ImageSource::DataUrl { .. } => "data url",
            ImageSource::Base64(_) => "base64",
        }
    }
}

/// Resolve `input` to an RGBA image, fetching it with `client` if it is a URL
pub async fn load_image(input: &str, client: &reqwest::Client) -> Result<RgbaImage> {
    let source = ImageSource::parse(input)?;
    debug!("loading image from {}", source.kind());

    let bytes = match source {
        ImageSource::Url(url) => fetch(url, client).await?,
        ImageSource::DataUrl { payload, .. } => decode_base64(payload)?,
        ImageSource::Base64(payload) => decode_base64(payload)?,
    };

    decode_bytes(&bytes)
}

async fn fetch(url: &str, client: &reqwest::Client) -> Result<Vec<u8>> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    debug!("fetched {} bytes from {url}", bytes.len());
    Ok(bytes.to_vec())
}

/// Decode a base64 payload, skipping any whitespace inside it
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let payload = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(payload.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    } else {
        Cow::Borrowed(payload)
    };
    Ok(BASE64.decode(payload.as_bytes())?)
}

/// Decode an encoded image of any supported format to RGBA
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.into_rgba8())
}
