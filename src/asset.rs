//! Objects stored in a bucket
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    client::{self, post_signed, read_json},
    config::Config,
    entry::{key_path, Entry, Resource},
    error::Result,
    fop::{FopOutput, ImageMogr, ImageView, Watermark},
    hash::url_safe_base64,
};

/// Metadata of a stored object
#[derive(Debug, Deserialize, Serialize)]
pub struct StatResult {
    /// Size in bytes
    pub fsize: u64,
    /// Content hash (etag)
    pub hash: String,
    #[serde(alias = "mimeType")]
    pub mime_type: String,
    /// Upload time, in units of 100 nanoseconds since the unix epoch
    #[serde(alias = "putTime")]
    pub put_time: i64,
}

/// Management operations available on every stored object
#[async_trait]
pub trait ResourceApi: Resource + Sync {
    /// Gets the metadata of the object
    async fn stat(&self) -> Result<StatResult> {
        let path = format!("/stat/{}", self.entry_url());
        let response = post_signed(self.config(), &self.config().rs_url, &path, None).await?;
        read_json(response).await
    }

    /// Moves the object to `dest`
    async fn move_to<D>(&self, dest: &D) -> Result<()>
    where
        D: Resource + Sync + ?Sized,
    {
        let path = format!("/move/{}/{}", self.entry_url(), dest.entry_url());
        post_signed(self.config(), &self.config().rs_url, &path, None).await?;
        Ok(())
    }

    /// Copies the object to `dest`
    async fn copy_to<D>(&self, dest: &D) -> Result<()>
    where
        D: Resource + Sync + ?Sized,
    {
        let path = format!("/copy/{}/{}", self.entry_url(), dest.entry_url());
        post_signed(self.config(), &self.config().rs_url, &path, None).await?;
        Ok(())
    }

    /// Deletes the object
    async fn remove(&self) -> Result<()> {
        let path = format!("/delete/{}", self.entry_url());
        post_signed(self.config(), &self.config().rs_url, &path, None).await?;
        Ok(())
    }

    /// Asks the service to download `source_url` and store it as this object
    async fn fetch(&self, source_url: &str) -> Result<()> {
        let path = format!(
            "/fetch/{}/to/{}",
            url_safe_base64(source_url),
            self.entry_url()
        );
        post_signed(self.config(), &self.config().vip_url, &path, None).await?;
        Ok(())
    }
}

/// A single object in a bucket
#[derive(Clone, Debug)]
pub struct Asset {
    entry: Entry,
    domain: String,
    config: Arc<Config>,
}

impl Asset {
    /// `domain` is the `scheme://host` the bucket is served from
    pub(crate) fn new(entry: Entry, domain: String, config: Arc<Config>) -> Self {
        Self {
            entry,
            domain,
            config,
        }
    }

    pub fn key(&self) -> &str {
        &self.entry.key
    }

    /// Fetches the object processed with a predefined style
    ///
    /// The style is addressed as `<url><separate><alias>`.
    pub async fn alias(&self, alias: &str) -> Result<Bytes> {
        let response = client::get(&self.alias_url(alias)).await?;
        Ok(response.bytes().await?)
    }

    /// Like [`Asset::alias`], but yields the body chunk by chunk
    pub async fn alias_stream(&self, alias: &str) -> Result<impl Stream<Item = Result<Bytes>>> {
        client::get_stream(&self.alias_url(alias)).await
    }

    fn alias_url(&self, alias: &str) -> String {
        format!("{}{}{}", self.url(), self.config.separate, alias)
    }
}

impl Resource for Asset {
    fn entry(&self) -> &Entry {
        &self.entry
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}{}", self.domain, key_path(&self.entry.key))
    }
}

impl ResourceApi for Asset {}

/// An image stored in a bucket
///
/// Everything an [`Asset`] can do, plus shortcuts for single image transforms.
#[derive(Clone, Debug)]
pub struct Image {
    asset: Asset,
}

impl Image {
    pub(crate) fn new(asset: Asset) -> Self {
        Self { asset }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Format, size and color model of the image
    pub async fn image_info(&self) -> Result<Value> {
        Self::json(self.fop().image_info().exec().await?)
    }

    /// EXIF metadata of the image
    pub async fn exif(&self) -> Result<Value> {
        Self::json(self.fop().exif().exec().await?)
    }

    /// A thumbnail of the image
    pub async fn image_view(&self, options: ImageView) -> Result<Bytes> {
        Self::binary(self.fop().image_view(options).exec().await?)
    }

    /// The image after advanced processing (crop, rotate, ...)
    pub async fn image_mogr(&self, options: ImageMogr) -> Result<Bytes> {
        Self::binary(self.fop().image_mogr(options).exec().await?)
    }

    /// The image with a watermark applied
    pub async fn watermark(&self, options: Watermark) -> Result<Bytes> {
        Self::binary(self.fop().watermark(options).exec().await?)
    }

    pub async fn alias(&self, alias: &str) -> Result<Bytes> {
        self.asset.alias(alias).await
    }

    pub async fn alias_stream(&self, alias: &str) -> Result<impl Stream<Item = Result<Bytes>>> {
        self.asset.alias_stream(alias).await
    }

    fn json(output: FopOutput) -> Result<Value> {
        match output {
            FopOutput::Json(value) => Ok(value),
            FopOutput::Binary(bytes) => client::parse_json(&bytes),
        }
    }

    fn binary(output: FopOutput) -> Result<Bytes> {
        match output {
            FopOutput::Binary(bytes) => Ok(bytes),
            FopOutput::Json(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
        }
    }
}

impl Resource for Image {
    fn entry(&self) -> &Entry {
        self.asset.entry()
    }

    fn config(&self) -> &Config {
        self.asset.config()
    }

    fn url(&self) -> String {
        self.asset.url()
    }
}

impl ResourceApi for Image {}

/// These unit tests test against a mock server.  They will not test integration issues
/// with the storage service but they are useful for regression and testing corner cases.
#[cfg(test)]
mod tests {
    use mockito::{Matcher, Mock, ServerGuard};

    use super::*;
    use crate::{config::Credentials, token::AccessToken};

    fn create_config(mock_server: &ServerGuard) -> Arc<Config> {
        let mut config = Config::new(Credentials::new("ak", "sk"));
        config.rs_url = mock_server.url();
        config.vip_url = mock_server.url();
        Arc::new(config)
    }

    fn create_asset(mock_server: &ServerGuard, key: &str) -> Asset {
        Asset::new(
            Entry::new("b", key),
            mock_server.url(),
            create_config(mock_server),
        )
    }

    fn expected_authorization(path: &str) -> String {
        AccessToken::new(&Credentials::new("ak", "sk"))
            .token(path, None)
            .unwrap()
    }

    async fn setup_mock_management(path: &str, body: Option<&str>) -> (ServerGuard, Mock) {
        let mut server = mockito::Server::new_async().await;

        let mut mock = server
            .mock("POST", path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .match_header("authorization", expected_authorization(path).as_str())
            .match_header("content-type", "application/x-www-form-urlencoded");
        if let Some(body) = body {
            mock = mock.with_body(body);
        }

        (server, mock)
    }

    #[test]
    fn asset_url_and_entry() {
        let asset = Asset::new(
            Entry::new("b", "a.jpg"),
            "http://b.qiniudn.com".to_string(),
            Arc::new(Config::default()),
        );
        assert_eq!(asset.url(), "http://b.qiniudn.com/a.jpg");
        assert_eq!(asset.entry_url(), "YjphLmpwZw==");
        assert_eq!(asset.key(), "a.jpg");
    }

    #[test]
    fn asset_url_escapes_key() {
        let asset = Asset::new(
            Entry::new("b", "dir/a?b#c.jpg"),
            "http://b.qiniudn.com".to_string(),
            Arc::new(Config::default()),
        );
        assert_eq!(asset.url(), "http://b.qiniudn.com/dir/a%3Fb%23c.jpg");
        assert_eq!(asset.entry_url(), url_safe_base64("b:dir/a?b#c.jpg"));
    }

    #[tokio::test]
    async fn can_stat() {
        let (server, mock) = setup_mock_management(
            "/stat/YjphLmpwZw==",
            Some("{\"fsize\":1024,\"hash\":\"Fh8x\",\"mimeType\":\"image/jpeg\",\"putTime\":13603956734587420}"),
        )
        .await;
        let mock = mock.create_async().await;

        let stat = create_asset(&server, "a.jpg").stat().await.unwrap();

        assert_eq!(stat.fsize, 1024);
        assert_eq!(stat.hash, "Fh8x");
        assert_eq!(stat.mime_type, "image/jpeg");
        assert_eq!(stat.put_time, 13603956734587420);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stat_empty_body_is_an_error() {
        let (server, mock) = setup_mock_management("/stat/YjphLmpwZw==", None).await;
        let mock = mock.create_async().await;

        let err = create_asset(&server, "a.jpg").stat().await.unwrap_err();

        assert!(matches!(err, crate::error::QiniuError::EmptyResponse()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn can_move() {
        let (server, mock) = setup_mock_management("/move/Yjpi/Yjpj", None).await;
        let mock = mock.create_async().await;

        let src = create_asset(&server, "b");
        let dest = create_asset(&server, "c");
        src.move_to(&dest).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn can_copy_to_image() {
        let (server, mock) = setup_mock_management("/copy/Yjpi/Yjpj", None).await;
        let mock = mock.create_async().await;

        let src = create_asset(&server, "b");
        let dest = Image::new(create_asset(&server, "c"));
        src.copy_to(&dest).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn can_remove() {
        let (server, mock) = setup_mock_management("/delete/Yjph", None).await;
        let mock = mock.create_async().await;

        create_asset(&server, "a").remove().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn can_fetch() {
        let path = "/fetch/aHR0cDovL2V4YW1wbGUuY29tL2xvZ28ucG5n/to/Yjph";
        let (server, mock) = setup_mock_management(path, None).await;
        let mock = mock.create_async().await;

        create_asset(&server, "a")
            .fetch("http://example.com/logo.png")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn can_fetch_alias() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.jpg-thumb")
            .with_status(200)
            .with_body("thumbnail")
            .create_async()
            .await;

        let bytes = create_asset(&server, "a.jpg").alias("thumb").await.unwrap();

        assert_eq!(bytes, "thumbnail".as_bytes());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn can_stream_alias() {
        use futures::TryStreamExt;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a%3Fb.jpg-thumb")
            .with_status(200)
            .with_body("thumbnail")
            .create_async()
            .await;

        let image = Image::new(create_asset(&server, "a?b.jpg"));
        let chunks: Vec<Bytes> = image
            .alias_stream("thumb")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), b"thumbnail");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn image_shortcuts() {
        let mut server = mockito::Server::new_async().await;
        let info = server
            .mock("GET", "/a.jpg?imageInfo")
            .with_status(200)
            .with_body("{\"format\":\"jpeg\",\"width\":640}")
            .create_async()
            .await;
        let thumb = server
            .mock("GET", Matcher::Exact("/a.jpg?imageView/2/w/180".to_string()))
            .with_status(200)
            .with_body("jpeg bytes")
            .create_async()
            .await;

        let image = Image::new(create_asset(&server, "a.jpg"));
        let value = image.image_info().await.unwrap();
        let bytes = image
            .image_view(ImageView {
                mode: 2,
                width: Some(180),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(value["format"], "jpeg");
        assert_eq!(bytes, "jpeg bytes".as_bytes());
        info.assert_async().await;
        thumb.assert_async().await;
    }
}
