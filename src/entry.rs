//! Canonical addressing of stored objects
use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{config::Config, fop::Fop, hash::url_safe_base64};

/// Characters of a key that would otherwise end or corrupt the URL path
const KEY_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Identifies a stored object by bucket and key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry {
    pub bucket: String,
    pub key: String,
}

impl Entry {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// The encoded `bucket:key` form used in management API paths
    pub fn entry_url(&self) -> String {
        entry_url(&self.bucket, &self.key)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.key)
    }
}

pub fn entry_url(bucket: &str, key: &str) -> String {
    url_safe_base64(format!("{bucket}:{key}"))
}

/// The URL path of a key under a domain: `/` + key, escaped
///
/// `/` is kept so keys can mimic directories.
pub(crate) fn key_path(key: &str) -> String {
    let key = key.strip_prefix('/').unwrap_or(key);
    format!("/{}", utf8_percent_encode(key, KEY_PATH))
}

/// An object that lives at a public URL and has a canonical [`Entry`]
pub trait Resource {
    fn entry(&self) -> &Entry;

    fn config(&self) -> &Config;

    /// The public URL of the object, e.g. `http://bucket.qiniudn.com/key`
    fn url(&self) -> String;

    fn entry_url(&self) -> String {
        self.entry().entry_url()
    }

    /// Starts a transformation chain on the object
    fn fop(&self) -> Fop {
        Fop::new(self.url(), self.config().credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::decode_url_safe_base64;

    #[test]
    fn entry_url_decodes_to_bucket_and_key() {
        let encoded = entry_url("images", "2024/cat+dog.jpg");
        let decoded = decode_url_safe_base64(&encoded).unwrap();
        assert_eq!(decoded, b"images:2024/cat+dog.jpg");
    }

    #[test]
    fn entry_matches_free_function() {
        let entry = Entry::new("b", "a.jpg");
        assert_eq!(entry.entry_url(), "YjphLmpwZw==");
        assert_eq!(entry.to_string(), "b:a.jpg");
    }

    #[test]
    fn key_path_escapes_query_and_fragment() {
        assert_eq!(key_path("a.jpg"), "/a.jpg");
        assert_eq!(key_path("/a.jpg"), "/a.jpg");
        assert_eq!(key_path("dir/a?b#c.jpg"), "/dir/a%3Fb%23c.jpg");
        assert_eq!(key_path("100% cat.jpg"), "/100%25%20cat.jpg");
    }

    #[test]
    fn entry_url_keeps_key_unescaped() {
        let decoded = decode_url_safe_base64(&entry_url("b", "a?b#c.jpg")).unwrap();
        assert_eq!(decoded, b"b:a?b#c.jpg");
    }
}
