//! Error handling utilities for the crate
use thiserror::Error;

use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;

/// All errors raised by this crate will be instances of QiniuError
#[derive(Error, Debug)]
pub enum QiniuError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Internal HTTP error: {0}")]
    HttpError(#[from] ReqwestError),
    #[error("The service rejected the request ({0}): {1}")]
    ServiceError(u16, String),
    #[error("The service returned an empty response where a JSON body was expected")]
    EmptyResponse(),
    #[error("Malformed JSON in response: {0}")]
    ParseError(#[from] JsonError),
}

impl QiniuError {
    pub fn service_error(status_code: reqwest::StatusCode, message: Option<String>) -> Self {
        QiniuError::ServiceError(
            status_code.as_u16(),
            message.unwrap_or_else(|| {
                status_code
                    .canonical_reason()
                    .unwrap_or("Unknown Error")
                    .to_string()
            }),
        )
    }

    pub fn required(field_name: &str) -> Self {
        QiniuError::Configuration(format!("{} is required", field_name))
    }
}

pub(crate) type Result<T> = std::result::Result<T, QiniuError>;
