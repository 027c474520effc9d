//! Credentials and service endpoints
//!
//! Every signer and operation takes an explicit [`Config`].  For convenience a
//! process-wide default is kept as well; it is read from the environment on first
//! use and can be replaced at any time with [`set_global`] or [`configure`].
//! Replacement swaps the whole snapshot, so a signer that already holds the old
//! snapshot keeps signing with it.
use std::{env, sync::Arc};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{
    error::{QiniuError, Result},
    token::PutPolicyOptions,
};

const DEFAULT_RS_URL: &str = "rs.qbox.me";
const DEFAULT_UPLOAD_URL: &str = "up.qbox.me";
const DEFAULT_VIP_URL: &str = "iovip.qbox.me";
const DEFAULT_CDN_DOMAIN: &str = "qiniudn.com";
const DEFAULT_SEPARATE: &str = "-";

static GLOBAL_CONFIG: Lazy<RwLock<Arc<Config>>> =
    Lazy::new(|| RwLock::new(Arc::new(Config::from_env())));

/// The access key / secret key pair used to sign every request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

// Custom implementation of Debug to avoid printing the secret key
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"**********")
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn is_empty(&self) -> bool {
        self.access_key.is_empty() || self.secret_key.is_empty()
    }

    /// Fails unless both keys are present
    pub(crate) fn ensure_present(&self) -> Result<&Self> {
        if self.access_key.is_empty() {
            return Err(QiniuError::required("access_key"));
        }
        if self.secret_key.is_empty() {
            return Err(QiniuError::required("secret_key"));
        }
        Ok(self)
    }
}

/// Endpoints and credentials for the storage service
///
/// Hosts may be given as bare hostnames (`rs.qbox.me`), in which case requests
/// use plain `http`, or as full base URLs (`https://rs.example.com:8443`) which
/// are used verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub credentials: Credentials,
    /// Host of the management API (stat / move / copy / delete / batch)
    pub rs_url: String,
    /// Host of the upload API
    pub upload_url: String,
    /// Host of the fetch API
    pub vip_url: String,
    /// Buckets are served from `<bucket>.<cdn_domain>` unless a bucket sets its own domain
    pub cdn_domain: String,
    /// Separator between a key and a style alias
    pub separate: String,
    /// Options applied to every upload token unless the bucket or the call sets them
    ///
    /// The scope is always taken from the bucket, so it is ignored here.
    pub upload_policy: PutPolicyOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            rs_url: DEFAULT_RS_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            vip_url: DEFAULT_VIP_URL.to_string(),
            cdn_domain: DEFAULT_CDN_DOMAIN.to_string(),
            separate: DEFAULT_SEPARATE.to_string(),
            upload_policy: PutPolicyOptions::default(),
        }
    }
}

impl Config {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    /// Builds a config from `QINIU_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Config::default();
        for (name, key) in [
            ("QINIU_ACCESS_KEY", "access_key"),
            ("QINIU_SECRET_KEY", "secret_key"),
            ("QINIU_RS_URL", "rs_url"),
            ("QINIU_UPLOAD_URL", "upload_url"),
            ("QINIU_VIP_URL", "vip_url"),
            ("QINIU_CDN_DOMAIN", "cdn_domain"),
        ] {
            if let Ok(value) = env::var(name) {
                // Every key above is known to `set`.
                let _ = config.set(key, value);
            }
        }
        config
    }

    /// Sets a single option by name
    ///
    /// Both snake_case and camelCase names are accepted.  Besides the endpoints
    /// and credentials, the upload policy options (`callback_url`, `deadline`, ...)
    /// can be set here and become defaults for every upload token.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<&mut Self> {
        let value = value.into();
        let policy = &mut self.upload_policy;
        match key {
            "access_key" | "accessKey" => self.credentials.access_key = value,
            "secret_key" | "secretKey" => self.credentials.secret_key = value,
            "rs_url" | "rsUrl" => self.rs_url = value,
            "upload_url" | "uploadUrl" => self.upload_url = value,
            "vip_url" | "vipUrl" => self.vip_url = value,
            "cdn_domain" | "cdnDomain" => self.cdn_domain = value,
            "separate" => self.separate = value,
            "deadline" => {
                let deadline = value.parse().map_err(|_| {
                    QiniuError::Configuration(format!("invalid deadline: {value}"))
                })?;
                policy.deadline = Some(deadline);
            }
            "end_user" | "endUser" => policy.end_user = Some(value),
            "return_url" | "returnUrl" => policy.return_url = Some(value),
            "return_body" | "returnBody" => policy.return_body = Some(value),
            "callback_url" | "callbackUrl" => policy.callback_url = Some(value),
            "callback_body" | "callbackBody" => policy.callback_body = Some(value),
            "async_ops" | "asyncOps" => policy.async_ops = Some(value),
            _ => {
                return Err(QiniuError::Configuration(format!(
                    "unknown config key: {key}"
                )))
            }
        }
        Ok(self)
    }

    /// Reads a single option by name
    ///
    /// Upload policy options that were never set read as `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        let policy = &self.upload_policy;
        match key {
            "access_key" | "accessKey" => Some(self.credentials.access_key.clone()),
            "secret_key" | "secretKey" => Some(self.credentials.secret_key.clone()),
            "rs_url" | "rsUrl" => Some(self.rs_url.clone()),
            "upload_url" | "uploadUrl" => Some(self.upload_url.clone()),
            "vip_url" | "vipUrl" => Some(self.vip_url.clone()),
            "cdn_domain" | "cdnDomain" => Some(self.cdn_domain.clone()),
            "separate" => Some(self.separate.clone()),
            "deadline" => policy.deadline.map(|deadline| deadline.to_string()),
            "end_user" | "endUser" => policy.end_user.clone(),
            "return_url" | "returnUrl" => policy.return_url.clone(),
            "return_body" | "returnBody" => policy.return_body.clone(),
            "callback_url" | "callbackUrl" => policy.callback_url.clone(),
            "callback_body" | "callbackBody" => policy.callback_body.clone(),
            "async_ops" | "asyncOps" => policy.async_ops.clone(),
            _ => None,
        }
    }

    /// Sets several options at once, stopping at the first unknown key
    pub fn extend<K, V, I>(&mut self, options: I) -> Result<&mut Self>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in options {
            self.set(key.as_ref(), value)?;
        }
        Ok(self)
    }
}

/// Returns the current process-wide config
pub fn global() -> Arc<Config> {
    GLOBAL_CONFIG.read().clone()
}

/// Replaces the process-wide config
pub fn set_global(config: Config) {
    *GLOBAL_CONFIG.write() = Arc::new(config);
}

/// Changes one option of the process-wide config
pub fn configure(key: &str, value: impl Into<String>) -> Result<()> {
    let mut guard = GLOBAL_CONFIG.write();
    let mut updated = Config::clone(&guard);
    updated.set(key, value)?;
    *guard = Arc::new(updated);
    Ok(())
}
