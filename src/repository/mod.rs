//! Repository layer: typed requests against the remote catalog service
//!
//! Every request goes through the [`Transport`] seam so tests can substitute
//! an in-memory service for the HTTP client.

pub mod books;
pub mod borrows;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::ApiConfig,
    error::{ClientError, ClientResult},
    models::{ApiEnvelope, Paginated},
};

pub use http::HttpTransport;

/// Request handed to a [`Transport`]. `path` is relative to the API base path.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response: HTTP status plus the JSON body (`Null` when the body was not JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Sends one request and returns whatever the service answered.
///
/// Implementations return `Err` only when no response was received;
/// non-2xx statuses are classified by the repositories.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse>;
}

/// Main repository struct holding the transport
#[derive(Clone)]
pub struct Repository {
    pub books: books::BooksRepository,
    pub borrows: borrows::BorrowsRepository,
}

impl Repository {
    pub fn new(transport: Arc<dyn Transport>, api: &ApiConfig) -> Self {
        Self {
            books: books::BooksRepository::new(transport.clone(), api.page_size),
            borrows: borrows::BorrowsRepository::new(transport),
        }
    }
}

/// A response that passed the envelope checks
pub(crate) struct Reply {
    pub status: u16,
    pub envelope: ApiEnvelope,
}

impl Reply {
    /// Classify a raw response.
    ///
    /// 404 is `NotFound`; any other non-2xx status and any `success: false`
    /// body is a `Service` error carrying the server's message.
    pub fn check(response: ApiResponse, resource: &str) -> ClientResult<Self> {
        let status = response.status;
        let envelope: Option<ApiEnvelope> = serde_json::from_value(response.body).ok();
        let message = envelope.as_ref().and_then(|e| e.message.clone());

        if status == 404 {
            return Err(ClientError::NotFound(
                message.unwrap_or_else(|| format!("{} not found", resource)),
            ));
        }
        if !(200..300).contains(&status) {
            tracing::warn!("{} request failed with status {}", resource, status);
            return Err(ClientError::Service {
                status,
                message: message.unwrap_or_else(|| format!("Request failed with status {}", status)),
            });
        }

        match envelope {
            Some(envelope) if envelope.success => Ok(Self { status, envelope }),
            Some(_) => {
                tracing::warn!("{} request returned success=false", resource);
                Err(ClientError::Service {
                    status,
                    message: message.unwrap_or_else(|| "Request was not successful".to_string()),
                })
            }
            None => Err(ClientError::Service {
                status,
                message: "Malformed response envelope".to_string(),
            }),
        }
    }

    pub fn data<T: DeserializeOwned>(self) -> ClientResult<T> {
        let status = self.status;
        serde_json::from_value(self.envelope.data).map_err(|e| ClientError::Service {
            status,
            message: format!("Malformed response data: {}", e),
        })
    }

    pub fn page<T: DeserializeOwned>(self) -> ClientResult<Paginated<T>> {
        let status = self.status;
        let meta = self.envelope.meta.clone().ok_or_else(|| ClientError::Service {
            status,
            message: "Missing pagination meta".to_string(),
        })?;
        let items = self.data()?;
        Ok(Paginated { items, meta })
    }
}

/// Ids are interpolated into paths, so they must be a single non-empty segment
pub(crate) fn check_id(id: &str) -> ClientResult<()> {
    if id.trim().is_empty() {
        return Err(ClientError::Validation("id: must not be empty".to_string()));
    }
    if id.contains(['/', '?', '#']) {
        return Err(ClientError::Validation(format!("id: invalid characters in {:?}", id)));
    }
    Ok(())
}
