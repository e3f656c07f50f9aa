// THEORY:
// The fetch-decode adapter is the only place the pipeline touches the outside world.
// It is split in two halves so each can be exercised on its own:
//
// 1.  **Fetch** (`ImageFetcher`): one HTTP GET per URL, no retries. Anything short of a
//     complete body with a success status is a `FetchError`. The trait is the seam the
//     worker pool is generic over, so tests swap in canned responses.
// 2.  **Decode** (`decode_image`): picks a codec for the body and materializes the full
//     image in memory. Which codec is chosen depends on the `FormatPolicy`: sniffing the
//     magic bytes (the default) tolerates servers that mislabel their content, while
//     `ContentType` trusts the header and nothing else.

use crate::core_modules::pixel_grid::DecodedImage;
use crate::error::{DecodeError, FetchError};
use bytes::Bytes;
use image::ImageFormat;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Some image hosts reject requests that carry no User-Agent.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// How the codec for a response body is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPolicy {
    /// Detect the format from the body's magic bytes, falling back to the content type.
    #[default]
    Sniff,
    /// Use the declared `Content-Type` only.
    ContentType,
}

/// A complete response body plus its declared content type.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl FetchedBody {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

/// Obtains the raw bytes of an image.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedBody, FetchError>> + Send;
}

/// `ImageFetcher` backed by an async reqwest client.
#[derive(Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Wraps a preconfigured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for HttpImageSource {
    async fn fetch(&self, url: &Url) -> Result<FetchedBody, FetchError> {
        trace!(url = %url, "HTTP GET request starting");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            debug!(
                url = %url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            FetchError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        debug!(
            url = %url,
            status = status.as_u16(),
            bytes = bytes.len(),
            content_type = content_type.as_deref().unwrap_or(""),
            "HTTP response received"
        );

        Ok(FetchedBody {
            bytes,
            content_type,
        })
    }
}

/// Maps a `Content-Type` header value (parameters allowed) to an image format.
pub fn format_from_content_type(content_type: Option<&str>) -> Option<ImageFormat> {
    let mime = content_type?
        .split(';')
        .next()
        .map(|ct| ct.trim().to_ascii_lowercase())?;
    ImageFormat::from_mime_type(mime)
}

/// Picks the codec for `body` according to `policy`.
pub fn select_format(body: &FetchedBody, policy: FormatPolicy) -> Option<ImageFormat> {
    let declared = format_from_content_type(body.content_type.as_deref());
    match policy {
        FormatPolicy::ContentType => declared,
        FormatPolicy::Sniff => image::guess_format(&body.bytes).ok().or(declared),
    }
}

/// Decodes the full body into a pixel grid.
pub fn decode_image(body: &FetchedBody, policy: FormatPolicy) -> Result<DecodedImage, DecodeError> {
    let format = select_format(body, policy).ok_or_else(|| DecodeError::UnsupportedFormat {
        content_type: body.content_type.clone(),
    })?;
    if !format.reading_enabled() {
        return Err(DecodeError::UnsupportedFormat {
            content_type: body.content_type.clone(),
        });
    }

    let image = image::load_from_memory_with_format(&body.bytes, format)?;
    trace!(?format, width = image.width(), height = image.height(), "image decoded");
    Ok(DecodedImage::from(image))
}
