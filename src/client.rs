//! The entry point of the crate and the HTTP plumbing shared by every operation
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    batch::Batch,
    bucket::Bucket,
    config::{self, Config},
    error::{QiniuError, Result},
    token::AccessToken,
};

static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A handle to the storage service
///
/// Cheap to clone.  Every bucket and batch created from it shares its config.
///
/// ```ignore
/// let qiniu = Qiniu::new(Config::new(Credentials::new("ak", "sk")));
///
/// let bucket = qiniu.bucket("images");
/// let stat = bucket.key("gogopher.jpg").stat().await?;
/// ```
#[derive(Clone, Debug)]
pub struct Qiniu {
    config: Arc<Config>,
}

impl Qiniu {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Uses a snapshot of the process-wide config
    pub fn global() -> Self {
        Self {
            config: config::global(),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket::new(name, self.config.clone())
    }

    pub fn batch(&self) -> Batch {
        Batch::new(self.config.clone())
    }
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

/// Builds a URL from a configured host, which may or may not carry a scheme
pub(crate) fn host_url(host: &str, path: &str) -> String {
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    url_join(base, path.to_string())
}

fn url_join(left: String, right: String) -> String {
    if left.ends_with('/') {
        if let Some(stripped) = right.strip_prefix('/') {
            left + stripped
        } else {
            left + &right
        }
    } else if right.starts_with('/') || right.is_empty() {
        left + &right
    } else {
        left + "/" + &right
    }
}

/// Issues a signed POST against a management host
///
/// The path (and body, if any) are signed with an [`AccessToken`].
pub(crate) async fn post_signed(
    config: &Config,
    host: &str,
    path: &str,
    body: Option<String>,
) -> Result<Response> {
    let authorization = AccessToken::new(&config.credentials).token(path, body.as_deref())?;
    let url = host_url(host, path);
    debug!("POST {}", url);

    let mut request = GLOBAL_CLIENT
        .post(url)
        .header("authorization", authorization)
        .header("content-type", FORM_CONTENT_TYPE);
    if let Some(body) = body {
        request = request.body(body);
    }
    send(request).await
}

/// Issues a plain GET
pub(crate) async fn get(url: &str) -> Result<Response> {
    debug!("GET {}", url);
    send(GLOBAL_CLIENT.get(url)).await
}

/// Like [`get`], but hands the body over chunk by chunk as it arrives
///
/// Error statuses are reported before the first chunk.  A connection dropped
/// mid-body surfaces as an `HttpError` item.
pub(crate) async fn get_stream(url: &str) -> Result<impl Stream<Item = Result<Bytes>>> {
    let response = get(url).await?;
    Ok(response.bytes_stream().map_err(QiniuError::from))
}

pub(crate) fn http_client() -> &'static Client {
    &GLOBAL_CLIENT
}

/// Sends a request, turning non-success statuses into errors
pub(crate) async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(handle_error(response).await)
    }
}

async fn handle_error(response: Response) -> QiniuError {
    let status = response.status();
    let message = response
        .json::<ApiError>()
        .await
        .ok()
        .map(|error| error.error);
    warn!("request failed with status {}: {:?}", status, message);
    QiniuError::service_error(status, message)
}

/// Reads a JSON body, treating a zero-length body as a distinct failure
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    parse_json(&body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    if body.is_empty() {
        return Err(QiniuError::EmptyResponse());
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use all_asserts::assert_true;

    use super::*;
    use crate::config::Credentials;

    #[test]
    fn host_url_adds_scheme_to_bare_hosts() {
        assert_eq!(host_url("rs.qbox.me", "/stat/x"), "http://rs.qbox.me/stat/x");
        assert_eq!(
            host_url("https://rs.example.com/", "/stat/x"),
            "https://rs.example.com/stat/x"
        );
        assert_eq!(host_url("up.qbox.me", ""), "http://up.qbox.me");
    }

    #[test]
    fn parse_json_distinguishes_empty_from_malformed() {
        match parse_json::<serde_json::Value>(&Bytes::new()) {
            Err(QiniuError::EmptyResponse()) => {}
            other => panic!("expected empty response, got {:?}", other),
        }
        match parse_json::<serde_json::Value>(&Bytes::from_static(b"{not json")) {
            Err(QiniuError::ParseError(_)) => {}
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn service_errors_carry_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/stat/x")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body("{\"error\":\"bad token\"}")
            .create_async()
            .await;

        let config = Config::new(Credentials::new("ak", "sk"));
        let err = post_signed(&config, &server.url(), "/stat/x", None)
            .await
            .unwrap_err();
        match err {
            QiniuError::ServiceError(401, msg) => assert_eq!(msg, "bad token"),
            other => panic!("expected service error, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_stream_yields_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/big.bin")
            .with_status(200)
            .with_body(vec![7u8; 64 * 1024])
            .create_async()
            .await;

        let chunks: Vec<Bytes> = get_stream(&format!("{}/big.bin", server.url()))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), vec![7u8; 64 * 1024]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_stream_reports_status_before_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("{\"error\":\"no such file or directory\"}")
            .create_async()
            .await;

        match get_stream(&format!("{}/missing", server.url())).await {
            Err(QiniuError::ServiceError(404, msg)) => assert_eq!(msg, "no such file or directory"),
            Err(other) => panic!("expected service error, got {:?}", other),
            Ok(_) => panic!("expected service error, got a body"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn service_errors_without_body_use_reason() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/stat/x")
            .with_status(599)
            .create_async()
            .await;

        let config = Config::new(Credentials::new("ak", "sk"));
        let err = post_signed(&config, &server.url(), "/stat/x", None)
            .await
            .unwrap_err();
        assert_true!(matches!(err, QiniuError::ServiceError(599, _)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_sending() {
        let err = post_signed(&Config::default(), "127.0.0.1:9", "/stat/x", None)
            .await
            .unwrap_err();
        assert_true!(matches!(err, QiniuError::Configuration(_)));
    }
}
