//! Encoding and signing primitives shared by every token.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use sha1::Sha1;

use crate::error::{QiniuError, Result};

/// Base64 encode with the URL-safe alphabet (`/` becomes `_`, `+` becomes `-`).
///
/// Padding is kept.
pub fn url_safe_base64(content: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(content)
}

/// Reverse of [`url_safe_base64`].
pub fn decode_url_safe_base64(content: &str) -> Result<Vec<u8>> {
    URL_SAFE
        .decode(content)
        .map_err(|err| QiniuError::Configuration(format!("invalid url-safe base64: {err}")))
}

/// URL-safe base64 encoded HMAC with SHA1 hash.
pub fn hmac_sign(content: impl AsRef<[u8]>, secret_key: impl AsRef<[u8]>) -> String {
    // HMAC accepts keys of any length.
    let mut h = Hmac::<Sha1>::new_from_slice(secret_key.as_ref()).expect("invalid key length");
    h.update(content.as_ref());

    url_safe_base64(h.finalize().into_bytes())
}
