//! HTTP client for the product catalog REST API.

use crate::types::{ConcernCode, Product, ProductType, SkinType};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const PRODUCTS_BY_CONCERN_PATH: &str = "/products/select";
const PRODUCTS_BY_TYPE_PATH: &str = "/products/selectspec";
const HEALTH_PATH: &str = "/health";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One catalog lookup: a concern bucket for a skin type, optionally narrowed
/// to a product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductQuery {
    pub concern: ConcernCode,
    pub skin_type: SkinType,
    pub product_type: Option<ProductType>,
}

impl ProductQuery {
    /// Endpoint path: two segments for all products, three when filtered by type.
    pub fn path(&self) -> String {
        match self.product_type {
            None => format!(
                "{PRODUCTS_BY_CONCERN_PATH}/{}/{}",
                self.concern,
                self.skin_type.id()
            ),
            Some(product_type) => format!(
                "{PRODUCTS_BY_TYPE_PATH}/{}/{}/{}",
                self.concern,
                self.skin_type.id(),
                product_type.id()
            ),
        }
    }
}

/// Source of product records for a query. [`CatalogClient`] is the HTTP one.
#[allow(async_fn_in_trait)]
pub trait ProductLookup {
    async fn fetch_products(&self, query: &ProductQuery) -> Result<Vec<Product>, CatalogError>;
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone)]
pub struct CatalogClient {
    url: String,
    client: reqwest::Client,
}

impl CatalogClient {
    /// Build a client for the catalog at `url`. No timeout unless one is given.
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self, CatalogError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(url, builder.build()?))
    }

    pub fn with_client(url: &str, client: reqwest::Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.url
    }

    pub fn query_url(&self, query: &ProductQuery) -> String {
        format!("{}{}", self.url, query.path())
    }

    /// Issue one product lookup. Non-success statuses are errors.
    #[tracing::instrument(skip(self), err)]
    pub async fn get_products(&self, query: &ProductQuery) -> Result<Vec<Product>, CatalogError> {
        let response = self.client.get(self.query_url(query)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let products = decode_products(&body)?;
        tracing::debug!(count = products.len(), "catalog lookup returned");
        Ok(products)
    }

    /// Check catalog liveness (`GET /health`).
    #[tracing::instrument(skip(self), err)]
    pub async fn health(&self) -> Result<HealthStatus, CatalogError> {
        let response = self
            .client
            .get(format!("{}{HEALTH_PATH}", self.url))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl ProductLookup for CatalogClient {
    async fn fetch_products(&self, query: &ProductQuery) -> Result<Vec<Product>, CatalogError> {
        self.get_products(query).await
    }
}

/// Decode a product list body. The catalog encodes zero rows as `null`.
pub fn decode_products(body: &[u8]) -> Result<Vec<Product>, CatalogError> {
    let products: Option<Vec<Product>> = serde_json::from_slice(body)?;
    Ok(products.unwrap_or_default())
}
