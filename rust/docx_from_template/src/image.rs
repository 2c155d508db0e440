//! Image resolution: embedded `data:` payloads and remote HTTP(S) sources.
//!
//! Walkers only describe images as [`ImageRequest`]s. Fetching happens later through an
//! [`ImageFetcher`], and any failure turns into "no image" for the caller.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::model::{Alignment, ImageBlock, MediaKind};
use crate::style::declarations;
use crate::text::preview;

lazy_static! {
    static ref LEADING_LENGTH_RE: Regex = Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(px|pt)?\s*$").unwrap();
}

/// Where an `<img>` sits, which decides its default box and alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePlacement {
    Standalone,
    TableCell,
}

impl ImagePlacement {
    fn default_size(self) -> (u32, u32) {
        match self {
            ImagePlacement::Standalone => (200, 200),
            ImagePlacement::TableCell => (140, 55),
        }
    }

    // width/height, used when only max-height is known
    fn max_height_ratio(self) -> f64 {
        match self {
            ImagePlacement::Standalone => 1.0,
            ImagePlacement::TableCell => 2.5,
        }
    }

    fn default_alignment(self) -> Alignment {
        match self {
            ImagePlacement::Standalone => Alignment::Center,
            ImagePlacement::TableCell => Alignment::Left,
        }
    }
}

/// An image found by a walker, sized and aligned but not fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub alignment: Alignment,
    pub placement: ImagePlacement,
}

fn parse_length(value: &str) -> Option<u32> {
    let caps = LEADING_LENGTH_RE.captures(value)?;
    let n: f64 = caps[1].parse().ok()?;
    if n <= 0.0 {
        return None;
    }
    Some(n.round() as u32)
}

impl ImageRequest {
    /// Sizes the image from its `style`, `width` and `height` attributes.
    pub fn new(
        src: &str,
        style: &str,
        width_attr: Option<&str>,
        height_attr: Option<&str>,
        placement: ImagePlacement,
        alignment: Option<Alignment>,
    ) -> Self {
        let decls = declarations(style);
        let declared = |key: &str| {
            decls
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| parse_length(v))
        };

        let width = width_attr.and_then(parse_length).or_else(|| declared("width"));
        let height = height_attr.and_then(parse_length).or_else(|| declared("height"));
        let max_height = declared("max-height");

        let (mut w, mut h) = placement.default_size();
        if let Some(mh) = max_height {
            h = mh;
            w = (f64::from(mh) * placement.max_height_ratio()).round() as u32;
        } else if let Some(dw) = width {
            w = dw;
        }
        if let Some(dh) = height {
            h = dh;
        }

        Self {
            src: src.trim().to_string(),
            width: w,
            height: h,
            alignment: alignment.unwrap_or_else(|| placement.default_alignment()),
            placement,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid data URI: {0}")]
    InvalidDataUri(&'static str),
    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("server answered {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("fetch timed out")]
    Timeout,
    #[error("empty image payload")]
    Empty,
    #[error("unsupported image source")]
    UnsupportedSource,
}

/// Retrieves remote image bytes.
#[allow(async_fn_in_trait)]
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ImageError::Timeout
            } else {
                ImageError::Network(e.to_string())
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await.map_err(map_err)?;
        Ok(bytes.to_vec())
    }
}

/// Refuses every remote source; only embedded images survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl ImageFetcher for OfflineFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, ImageError> {
        Err(ImageError::UnsupportedSource)
    }
}

/// Decodes `data:<mime>;base64,<payload>`, returning the bytes and the declared MIME type.
pub fn decode_data_uri(src: &str) -> Result<(Vec<u8>, String), ImageError> {
    let rest = src
        .strip_prefix("data:")
        .ok_or(ImageError::InvalidDataUri("missing data: prefix"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or(ImageError::InvalidDataUri("missing comma"))?;
    if !meta.to_ascii_lowercase().ends_with(";base64") {
        return Err(ImageError::InvalidDataUri("payload is not base64"));
    }
    let mime = meta
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned.as_bytes())?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok((bytes, mime))
}

/// Magic bytes first, then the MIME type, then PNG.
pub fn sniff_kind(bytes: &[u8], mime: Option<&str>) -> MediaKind {
    if let Ok(format) = ::image::guess_format(bytes) {
        match format {
            ::image::ImageFormat::Png => return MediaKind::Png,
            ::image::ImageFormat::Jpeg => return MediaKind::Jpeg,
            ::image::ImageFormat::Gif => return MediaKind::Gif,
            ::image::ImageFormat::Bmp => return MediaKind::Bmp,
            ::image::ImageFormat::Tiff => return MediaKind::Tiff,
            ::image::ImageFormat::WebP => return MediaKind::Webp,
            _ => {}
        }
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_ascii_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return MediaKind::Svg;
    }

    match mime.unwrap_or("") {
        "image/jpeg" | "image/jpg" => MediaKind::Jpeg,
        "image/gif" => MediaKind::Gif,
        "image/bmp" => MediaKind::Bmp,
        "image/tiff" => MediaKind::Tiff,
        "image/webp" => MediaKind::Webp,
        "image/svg+xml" => MediaKind::Svg,
        _ => MediaKind::Png,
    }
}

async fn load_bytes<F: ImageFetcher>(
    src: &str,
    fetcher: &F,
) -> Result<(Vec<u8>, MediaKind), ImageError> {
    if src.starts_with("data:") {
        let (bytes, mime) = decode_data_uri(src)?;
        let kind = sniff_kind(&bytes, Some(&mime));
        return Ok((bytes, kind));
    }

    let lower = src.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ImageError::UnsupportedSource);
    }

    let bytes = fetcher.fetch(src).await?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    let kind = sniff_kind(&bytes, None);
    Ok((bytes, kind))
}

/// Resolves one request. Every failure is logged and becomes `None`.
pub async fn load_image<F: ImageFetcher>(request: &ImageRequest, fetcher: &F) -> Option<ImageBlock> {
    if request.src.is_empty() {
        debug!("image without src skipped");
        return None;
    }

    match load_bytes(&request.src, fetcher).await {
        Ok((bytes, kind)) => {
            debug!(
                "image loaded: {} bytes, {:?}, {}x{} ({})",
                bytes.len(),
                kind,
                request.width,
                request.height,
                preview(&request.src)
            );
            Some(ImageBlock {
                bytes,
                kind,
                width: request.width,
                height: request.height,
                alignment: request.alignment,
            })
        }
        Err(err) => {
            warn!("image skipped ({}): {}", err, preview(&request.src));
            None
        }
    }
}
