use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::order_models::OrderRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to sign service account token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
}

/// A downstream system an order is copied into.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn deliver(&self, order: &OrderRecord) -> Result<(), SinkError>;
}
