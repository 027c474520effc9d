//! On-the-fly transformation of stored objects
//!
//! A [`Fop`] collects processing directives in call order and appends them to
//! the object's URL, joined with `|`:
//!
//! ```ignore
//! let thumbnail = bucket
//!     .key("x.jpg")
//!     .fop()
//!     .image_view(ImageView { mode: 2, width: Some(180), ..Default::default() })
//!     .image_mogr(ImageMogr { quality: Some(85), ..Default::default() })
//!     .exec()
//!     .await?;
//! ```
use std::fmt;

use bytes::Bytes;
use futures::Stream;
use serde_json::Value;

use crate::{
    client,
    config::Credentials,
    entry::Entry,
    error::{QiniuError, Result},
    hash::url_safe_base64,
    token::SaveasToken,
};

/// Options of the `imageView` thumbnail directive
#[derive(Clone, Debug, Default)]
pub struct ImageView {
    pub mode: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
    pub format: Option<String>,
}

/// Options of the `imageMogr` directive (always applied with `auto-orient`)
#[derive(Clone, Debug, Default)]
pub struct ImageMogr {
    pub thumbnail: Option<String>,
    pub gravity: Option<String>,
    pub crop: Option<String>,
    pub quality: Option<u8>,
    pub rotate: Option<i32>,
    pub format: Option<String>,
    pub blur: Option<String>,
}

/// Options of the `watermark` directive
///
/// Mode 1 overlays `image`, mode 2 draws `text`.  The image URL, text, font and
/// fill color are encoded as URL-safe base64.
#[derive(Clone, Debug, Default)]
pub struct Watermark {
    pub mode: u8,
    pub image: Option<String>,
    pub text: Option<String>,
    pub font: Option<String>,
    pub font_size: Option<u32>,
    pub fill: Option<String>,
    pub dissolve: Option<u8>,
    pub gravity: Option<String>,
    pub dx: Option<i32>,
    pub dy: Option<i32>,
}

/// Error correction level of a generated QR code
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QrLevel {
    #[default]
    L,
    M,
    Q,
    H,
}

impl fmt::Display for QrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            QrLevel::L => "L",
            QrLevel::M => "M",
            QrLevel::Q => "Q",
            QrLevel::H => "H",
        };
        f.write_str(level)
    }
}

/// Options of the markdown to html directive
#[derive(Clone, Debug, Default)]
pub struct Md2Html {
    pub mode: Option<u8>,
    /// URL of a stylesheet to link from the generated page
    pub css: Option<String>,
}

/// What a transform returned
#[derive(Clone, Debug, PartialEq)]
pub enum FopOutput {
    /// `imageInfo` and `exif` answer with JSON
    Json(Value),
    Binary(Bytes),
}

impl FopOutput {
    pub fn json(&self) -> Option<&Value> {
        match self {
            FopOutput::Json(value) => Some(value),
            FopOutput::Binary(_) => None,
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            FopOutput::Json(_) => None,
            FopOutput::Binary(bytes) => Some(bytes),
        }
    }
}

/// An ordered chain of processing directives on one object
#[derive(Clone, Debug)]
pub struct Fop {
    base_url: String,
    credentials: Credentials,
    directives: Vec<String>,
}

fn segments<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<String>)>) -> String {
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| format!("/{key}/{value}")))
        .collect()
}

impl Fop {
    pub(crate) fn new(base_url: String, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
            directives: Vec::new(),
        }
    }

    /// Appends a raw directive
    pub fn fop(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn image_info(self) -> Self {
        self.fop("imageInfo")
    }

    pub fn exif(self) -> Self {
        self.fop("exif")
    }

    pub fn image_view(self, options: ImageView) -> Self {
        let directive = format!(
            "imageView/{}{}",
            options.mode,
            segments([
                ("w", options.width.map(|v| v.to_string())),
                ("h", options.height.map(|v| v.to_string())),
                ("q", options.quality.map(|v| v.to_string())),
                ("format", options.format),
            ])
        );
        self.fop(directive)
    }

    pub fn image_mogr(self, options: ImageMogr) -> Self {
        let directive = format!(
            "imageMogr/v2/auto-orient{}",
            segments([
                ("thumbnail", options.thumbnail),
                ("gravity", options.gravity),
                ("crop", options.crop),
                ("quality", options.quality.map(|v| v.to_string())),
                ("rotate", options.rotate.map(|v| v.to_string())),
                ("format", options.format),
                ("blur", options.blur),
            ])
        );
        self.fop(directive)
    }

    pub fn watermark(self, options: Watermark) -> Self {
        let directive = format!(
            "watermark/{}{}",
            options.mode,
            segments([
                ("image", options.image.map(url_safe_base64)),
                ("text", options.text.map(url_safe_base64)),
                ("font", options.font.map(url_safe_base64)),
                ("fontsize", options.font_size.map(|v| v.to_string())),
                ("fill", options.fill.map(url_safe_base64)),
                ("dissolve", options.dissolve.map(|v| v.to_string())),
                ("gravity", options.gravity),
                ("dx", options.dx.map(|v| v.to_string())),
                ("dy", options.dy.map(|v| v.to_string())),
            ])
        );
        self.fop(directive)
    }

    pub fn qrcode(self, mode: u8, level: QrLevel) -> Self {
        self.fop(format!("qrcode/{mode}/level/{level}"))
    }

    pub fn md2html(self, options: Md2Html) -> Self {
        let directive = format!(
            "md2html{}{}",
            options.mode.map(|m| format!("/{m}")).unwrap_or_default(),
            segments([("css", options.css.map(url_safe_base64))])
        );
        self.fop(directive)
    }

    /// Serves the result as an attachment named `filename`
    pub fn download(self, filename: &str) -> Self {
        self.fop(format!("download/{filename}"))
    }

    /// Persists the result of the chain as `target`
    ///
    /// The URL built from the directives so far is signed, so this must be the
    /// last directive added.
    pub fn saveas(self, target: &Entry) -> Result<Self> {
        let url = self.url()?;
        let sign = SaveasToken::new(&self.credentials).token(&url)?;
        let directive = format!("saveas/{}/sign/{}", target.entry_url(), sign);
        Ok(self.fop(directive))
    }

    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    /// The `|`-joined query string
    pub fn query(&self) -> String {
        self.directives.join("|")
    }

    /// The object URL with the chain appended
    pub fn url(&self) -> Result<String> {
        if self.directives.is_empty() {
            return Err(QiniuError::Configuration(
                "the fop chain has no directives".to_string(),
            ));
        }
        Ok(format!("{}?{}", self.base_url, self.query()))
    }

    fn answers_json(&self) -> bool {
        matches!(
            self.directives.last().map(String::as_str),
            Some("imageInfo") | Some("exif")
        )
    }

    /// Runs the chain
    ///
    /// The body is returned as-is unless the chain ends in `imageInfo` or
    /// `exif`, in which case it is parsed as JSON.
    pub async fn exec(&self) -> Result<FopOutput> {
        let response = client::get(&self.url()?).await?;
        let body = response.bytes().await?;
        if self.answers_json() {
            Ok(FopOutput::Json(client::parse_json(&body)?))
        } else {
            Ok(FopOutput::Binary(body))
        }
    }

    /// Runs the chain, handing the result over chunk by chunk
    ///
    /// The body is never parsed, even for `imageInfo` or `exif`.
    pub async fn stream(&self) -> Result<impl Stream<Item = Result<Bytes>>> {
        client::get_stream(&self.url()?).await
    }
}
