//! Buckets: uploading, downloading and handing out objects
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use log::debug;
use reqwest::{
    multipart::{Form, Part},
    Body,
};
use serde::{Deserialize, Serialize};

use crate::{
    asset::{Asset, Image},
    client::{self, host_url, read_json},
    config::Config,
    entry::Entry,
    error::{QiniuError, Result},
    token::{DownloadToken, GetPolicy, PutPolicy, PutPolicyOptions},
};

/// The response from the upload operation
#[derive(Debug, Deserialize, Serialize)]
pub struct PutResult {
    /// Content hash (etag) of the stored object
    pub hash: String,
    /// The key the object was stored under
    pub key: String,
}

/// A named bucket of the storage service
#[derive(Clone, Debug)]
pub struct Bucket {
    name: String,
    /// Overrides `<name>.<cdn_domain>`
    domain: Option<String>,
    /// Upload options for this bucket, layered over the config's
    policy: PutPolicyOptions,
    config: Arc<Config>,
}

impl Bucket {
    pub fn new(name: impl Into<String>, config: Arc<Config>) -> Self {
        Self {
            name: name.into(),
            domain: None,
            policy: PutPolicyOptions::default(),
            config,
        }
    }

    /// Serves the bucket from a custom domain instead of `<bucket>.<cdn_domain>`
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets upload options every token of this bucket starts from
    ///
    /// These take precedence over the config's `upload_policy`.  The scope is
    /// always the bucket name unless a call passes its own.
    pub fn with_policy(mut self, policy: PutPolicyOptions) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `scheme://host` objects of this bucket are downloaded from
    pub fn domain(&self) -> String {
        match &self.domain {
            Some(domain) if domain.contains("://") => domain.trim_end_matches('/').to_string(),
            Some(domain) => format!("http://{}", domain.trim_end_matches('/')),
            None => format!("http://{}.{}", self.name, self.config.cdn_domain),
        }
    }

    pub fn key(&self, key: &str) -> Asset {
        Asset::new(
            Entry::new(self.name.clone(), key),
            self.domain(),
            self.config.clone(),
        )
    }

    pub fn image(&self, key: &str) -> Image {
        Image::new(self.key(key))
    }

    /// Creates an upload token for this bucket
    ///
    /// Options left unset fall back to the bucket's policy, then to the config's
    /// `upload_policy`.  The scope defaults to the bucket name; pass `bucket:key`
    /// to allow overwriting one existing key.
    pub fn token(&self, options: PutPolicyOptions) -> Result<String> {
        let scope = options.scope.clone().unwrap_or_else(|| self.name.clone());
        let options = PutPolicyOptions {
            scope: Some(scope),
            ..options
                .with_defaults(&self.policy)
                .with_defaults(&self.config.upload_policy)
        };
        PutPolicy::new(options)?.token(&self.config.credentials)
    }

    /// Uploads an object
    ///
    /// # Arguments
    ///
    /// * `key` - The key to store the object under
    /// * `body` - The contents of the object
    /// * `options` - Upload policy; the scope defaults to the bucket name
    pub async fn put(
        &self,
        key: &str,
        body: impl Into<Body> + Send,
        options: PutPolicyOptions,
    ) -> Result<PutResult> {
        if key.is_empty() {
            return Err(QiniuError::required("key"));
        }
        let token = self.token(options)?;

        let form = Form::new()
            .text("token", token)
            .text("key", key.to_string())
            .part("file", Part::stream(body).file_name(key.to_string()));

        let url = host_url(&self.config.upload_url, "");
        debug!("POST {} (upload of {}:{})", url, self.name, key);
        let response = client::send(client::http_client().post(url).multipart(form)).await?;
        read_json(response).await
    }

    /// A signed, time-limited download URL for a key
    pub fn download_url(&self, key: &str, policy: &GetPolicy) -> Result<DownloadToken> {
        policy.token(&self.config.credentials, &self.domain(), Some(key), None)
    }

    /// Downloads an object through a signed URL valid for the default hour
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let download = self.download_url(key, &GetPolicy::default())?;
        let response = client::get(&download.url).await?;
        Ok(response.bytes().await?)
    }

    /// Like [`Bucket::get`], but yields the object chunk by chunk as it downloads
    pub async fn get_stream(&self, key: &str) -> Result<impl Stream<Item = Result<Bytes>>> {
        let download = self.download_url(key, &GetPolicy::default())?;
        client::get_stream(&download.url).await
    }
}
