//! Borrows repository: `/borrow` endpoints

use std::sync::Arc;

use super::{ApiRequest, Reply, Transport};
use crate::{
    error::{ClientError, ClientResult},
    models::{borrow::BorrowPayload, BorrowInput, BorrowRecord, BorrowSummaryItem},
};

#[derive(Clone)]
pub struct BorrowsRepository {
    transport: Arc<dyn Transport>,
}

impl BorrowsRepository {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a borrow record
    pub async fn create(&self, borrow: &BorrowInput) -> ClientResult<BorrowRecord> {
        let body = serde_json::to_value(BorrowPayload::from(borrow))
            .map_err(|e| ClientError::Validation(format!("Failed to encode borrow: {}", e)))?;
        let response = self.transport.send(ApiRequest::post("/borrow", body)).await?;
        Reply::check(response, "Borrow")?.data()
    }

    /// Aggregate borrowed quantities per book
    pub async fn summary(&self) -> ClientResult<Vec<BorrowSummaryItem>> {
        let response = self.transport.send(ApiRequest::get("/borrow")).await?;
        Reply::check(response, "Borrow summary")?.data()
    }
}
