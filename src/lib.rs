//! The [Qiniu](https://www.qiniu.com) object storage service stores files in
//! buckets and serves them, optionally transformed, from a CDN.
//!
//! This crate supplies a rust client to access the service.  It builds the signed
//! requests and tokens the service expects: upload tokens, time-limited download
//! URLs, management API authorization and persisted transform signatures.
//!
//! To use the client all you need is a [`Config`] carrying your credentials:
//!
//! [`Config`]: crate::config::Config
//!
//! ```ignore
//! use qiniu_storage::prelude::*;
//!
//! let qiniu = Qiniu::new(Config::new(Credentials::new("access-key", "secret-key")));
//! let bucket = qiniu.bucket("images");
//!
//! bucket.put("gogopher.jpg", bytes, Default::default()).await?;
//!
//! let stat = bucket.key("gogopher.jpg").stat().await?;
//! println!("{} bytes", stat.fsize);
//!
//! let thumbnail = bucket
//!     .key("gogopher.jpg")
//!     .fop()
//!     .image_view(ImageView { mode: 2, width: Some(180), ..Default::default() })
//!     .exec()
//!     .await?;
//! ```
//!
//! A process-wide config is also available.  It is read from the `QINIU_*`
//! environment variables on first use and can be changed at any time:
//!
//! ```ignore
//! qiniu_storage::config::configure("access_key", "access-key")?;
//! qiniu_storage::config::configure("secret_key", "secret-key")?;
//!
//! let results = Qiniu::global()
//!     .batch()
//!     .stat(&bucket.key("a.jpg"))
//!     .remove(&bucket.key("b.jpg"))
//!     .exec()
//!     .await?;
//! ```
//!
//! Tokens can be generated without touching the network, for example to hand
//! an upload token to a browser:
//!
//! ```ignore
//! let token = PutPolicy::new(PutPolicyOptions {
//!     scope: Some("images".to_string()),
//!     deadline: Some(600),
//!     ..Default::default()
//! })?
//! .token(&credentials)?;
//! ```

pub mod asset;
pub mod batch;
pub mod bucket;
pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod fop;
pub mod hash;
pub mod token;

/// The types needed by most users, including the traits that carry the operations
pub mod prelude {
    pub use crate::asset::{Asset, Image, ResourceApi};
    pub use crate::batch::Batch;
    pub use crate::bucket::Bucket;
    pub use crate::client::Qiniu;
    pub use crate::config::{Config, Credentials};
    pub use crate::entry::{Entry, Resource};
    pub use crate::fop::{ImageMogr, ImageView, Md2Html, QrLevel, Watermark};
    pub use crate::token::{AccessToken, GetPolicy, PutPolicy, PutPolicyOptions, SaveasToken};
}
