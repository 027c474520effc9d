//! Upload, download and management tokens
//!
//! Three textual formats are produced:
//!
//! * `<access_key>:<digest>:<encoded_policy>` for uploads ([`PutPolicy`])
//! * `<access_key>:<digest>` for downloads and persisted transforms ([`GetPolicy`], [`SaveasToken`])
//! * `QBox <access_key>:<digest>` as the `Authorization` header of management calls ([`AccessToken`])
//!
//! All signing is synchronous and deterministic.  Time only enters through the
//! deadline, which is fixed when a policy is constructed.
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{
    config::Credentials,
    entry::key_path,
    error::{QiniuError, Result},
    hash::{decode_url_safe_base64, hmac_sign, url_safe_base64},
};

/// Default lifetime of a token, in seconds
pub const DEFAULT_DEADLINE: u64 = 3600;

/// Same set of characters as `encodeURIComponent` leaves alone
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn now() -> i64 {
    Utc::now().timestamp()
}

fn deadline_from(now: i64, offset: Option<u64>) -> Result<i64> {
    let offset = offset.unwrap_or(DEFAULT_DEADLINE);
    i64::try_from(offset)
        .ok()
        .and_then(|offset| now.checked_add(offset))
        .ok_or_else(|| QiniuError::Configuration(format!("deadline offset {offset} is too large")))
}

/// Options accepted when building an upload token
///
/// `deadline` is an offset in seconds from now.  `None` means one hour, and
/// `Some(0)` produces a token that expires immediately.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutPolicyOptions {
    /// `bucket` or `bucket:key`.  Required.
    pub scope: Option<String>,
    pub deadline: Option<u64>,
    pub end_user: Option<String>,
    pub return_url: Option<String>,
    pub return_body: Option<String>,
    pub callback_url: Option<String>,
    pub callback_body: Option<String>,
    pub async_ops: Option<String>,
}

impl PutPolicyOptions {
    /// Fills every unset option from `defaults`
    pub fn with_defaults(self, defaults: &PutPolicyOptions) -> Self {
        Self {
            scope: self.scope.or_else(|| defaults.scope.clone()),
            deadline: self.deadline.or(defaults.deadline),
            end_user: self.end_user.or_else(|| defaults.end_user.clone()),
            return_url: self.return_url.or_else(|| defaults.return_url.clone()),
            return_body: self.return_body.or_else(|| defaults.return_body.clone()),
            callback_url: self.callback_url.or_else(|| defaults.callback_url.clone()),
            callback_body: self.callback_body.or_else(|| defaults.callback_body.clone()),
            async_ops: self.async_ops.or_else(|| defaults.async_ops.clone()),
        }
    }
}

/// Constraints on a single upload
///
/// Unset optional fields are left out of the serialized policy entirely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutPolicy {
    pub scope: String,
    /// Unix timestamp (seconds) after which the token is rejected
    pub deadline: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_ops: Option<String>,
}

impl PutPolicy {
    pub fn new(options: PutPolicyOptions) -> Result<Self> {
        Self::new_at(options, now())
    }

    fn new_at(options: PutPolicyOptions, now: i64) -> Result<Self> {
        let scope = options
            .scope
            .filter(|scope| !scope.is_empty())
            .ok_or_else(|| QiniuError::required("scope"))?;

        Ok(Self {
            scope,
            deadline: deadline_from(now, options.deadline)?,
            end_user: options.end_user,
            return_url: options.return_url,
            return_body: options.return_body,
            callback_url: options.callback_url,
            callback_body: options.callback_body,
            async_ops: options.async_ops,
        })
    }

    /// Signs the policy, producing `<access_key>:<digest>:<encoded_policy>`
    pub fn token(&self, credentials: &Credentials) -> Result<String> {
        let credentials = credentials.ensure_present()?;

        let signature = url_safe_base64(serde_json::to_vec(self)?);
        let digest = hmac_sign(&signature, credentials.secret_key());

        Ok(format!(
            "{}:{}:{}",
            credentials.access_key(),
            digest,
            signature
        ))
    }

    /// Recovers the policy carried by an upload token
    ///
    /// The digest is not verified.
    pub fn decode(token: &str) -> Result<Self> {
        let encoded = token
            .rsplit(':')
            .next()
            .filter(|_| token.matches(':').count() == 2)
            .ok_or_else(|| QiniuError::Configuration("malformed upload token".to_string()))?;
        let json = decode_url_safe_base64(encoded)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// A signed download grant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadToken {
    /// `<access_key>:<digest>`
    pub token: String,
    /// The string that was signed
    pub request_url: String,
    /// `request_url` with the token appended, ready to be fetched
    pub url: String,
}

/// Time-limited download authorization
///
/// The deadline is fixed at construction, so every token produced by one
/// policy expires at the same moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetPolicy {
    deadline: i64,
}

impl Default for GetPolicy {
    fn default() -> Self {
        Self {
            deadline: now() + DEFAULT_DEADLINE as i64,
        }
    }
}

impl GetPolicy {
    /// `deadline` is an offset in seconds from now; `None` means one hour
    ///
    /// Offsets that do not fit a unix timestamp are rejected.
    pub fn new(deadline: Option<u64>) -> Result<Self> {
        Ok(Self {
            deadline: deadline_from(now(), deadline)?,
        })
    }

    /// Uses an absolute unix timestamp as the deadline
    pub fn with_deadline_epoch(deadline: i64) -> Self {
        Self { deadline }
    }

    pub fn deadline_epoch(&self) -> i64 {
        self.deadline
    }

    /// Signs a download
    ///
    /// Without a key the domain string itself is signed.  With a key the signed
    /// string is `<scheme>://<host><path>?<fop>&e=<deadline>`, where `fop`
    /// defaults to `e`.
    pub fn token(
        &self,
        credentials: &Credentials,
        domain: &str,
        key: Option<&str>,
        fop: Option<&str>,
    ) -> Result<DownloadToken> {
        let credentials = credentials.ensure_present()?;

        let base = match key {
            None => domain.to_string(),
            Some(key) => {
                format!(
                    "{}{}?{}&e={}",
                    origin_of(domain)?,
                    key_path(key),
                    utf8_percent_encode(fop.unwrap_or("e"), COMPONENT),
                    self.deadline
                )
            }
        };

        let token = format!(
            "{}:{}",
            credentials.access_key(),
            hmac_sign(&base, credentials.secret_key())
        );
        let url = format!("{}&token={}", base, token);

        Ok(DownloadToken {
            token,
            request_url: base,
            url,
        })
    }
}

/// `<scheme>://<host>[:<port>]` of a domain that may lack a scheme
fn origin_of(domain: &str) -> Result<String> {
    let parsed = match Url::parse(domain) {
        Ok(url) if url.has_host() => url,
        _ => Url::parse(&format!("http://{domain}"))
            .map_err(|err| QiniuError::Configuration(format!("invalid domain {domain}: {err}")))?,
    };
    let host = parsed
        .host_str()
        .ok_or_else(|| QiniuError::Configuration(format!("domain {domain} has no host")))?;

    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// Signs management API requests
#[derive(Clone, Copy, Debug)]
pub struct AccessToken<'a> {
    credentials: &'a Credentials,
}

impl<'a> AccessToken<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// Produces the `Authorization` header value for a request
    ///
    /// A missing body is signed the same as an empty one.
    pub fn token(&self, path: &str, body: Option<&str>) -> Result<String> {
        let credentials = self.credentials.ensure_present()?;
        let data = format!("{}\n{}", path, body.unwrap_or(""));

        Ok(format!(
            "QBox {}:{}",
            credentials.access_key(),
            hmac_sign(data, credentials.secret_key())
        ))
    }
}

/// Authorizes the service to persist the output of a transform
#[derive(Clone, Copy, Debug)]
pub struct SaveasToken<'a> {
    credentials: &'a Credentials,
}

impl<'a> SaveasToken<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// Signs the fully composed transform URL
    pub fn token(&self, url: &str) -> Result<String> {
        let credentials = self.credentials.ensure_present()?;
        Ok(format!(
            "{}:{}",
            credentials.access_key(),
            hmac_sign(url, credentials.secret_key())
        ))
    }
}
