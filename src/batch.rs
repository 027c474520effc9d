//! Several management operations in a single request
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::{post_signed, read_json},
    config::Config,
    entry::Resource,
    error::{QiniuError, Result},
};

const BATCH_PATH: &str = "/batch";

/// Outcome of one operation of a batch, in the order the operations were queued
///
/// Failures of individual operations are reported here through `code`; they do
/// not fail the batch as a whole.  An entry without a code reads as `0`, and
/// any fields besides `code` and `data` are kept in `extra`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BatchItem {
    #[serde(default)]
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Queues stat / move / copy / delete operations and sends them together
///
/// ```ignore
/// let results = qiniu
///     .batch()
///     .stat(&bucket.key("a.jpg"))
///     .move_to(&bucket.key("b.jpg"), &bucket.key("c.jpg"))
///     .exec()
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct Batch {
    config: Arc<Config>,
    ops: Vec<String>,
}

impl Batch {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            ops: Vec::new(),
        }
    }

    pub fn stat<R: Resource + ?Sized>(self, resource: &R) -> Self {
        let op = format!("/stat/{}", resource.entry_url());
        self.push(op)
    }

    pub fn move_to<S, D>(self, src: &S, dest: &D) -> Self
    where
        S: Resource + ?Sized,
        D: Resource + ?Sized,
    {
        let op = format!("/move/{}/{}", src.entry_url(), dest.entry_url());
        self.push(op)
    }

    pub fn copy_to<S, D>(self, src: &S, dest: &D) -> Self
    where
        S: Resource + ?Sized,
        D: Resource + ?Sized,
    {
        let op = format!("/copy/{}/{}", src.entry_url(), dest.entry_url());
        self.push(op)
    }

    pub fn remove<R: Resource + ?Sized>(self, resource: &R) -> Self {
        let op = format!("/delete/{}", resource.entry_url());
        self.push(op)
    }

    fn push(mut self, op: String) -> Self {
        self.ops.push(format!("op={op}"));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The request body: every queued operation joined with `&`
    pub fn body(&self) -> String {
        self.ops.join("&")
    }

    /// Sends the queued operations as one signed request
    ///
    /// An empty response body is reported as [`QiniuError::EmptyResponse`].
    pub async fn exec(self) -> Result<Vec<BatchItem>> {
        if self.ops.is_empty() {
            return Err(QiniuError::Configuration(
                "the batch has no operations".to_string(),
            ));
        }
        let response = post_signed(
            &self.config,
            &self.config.rs_url,
            BATCH_PATH,
            Some(self.body()),
        )
        .await?;
        read_json(response).await
    }
}
