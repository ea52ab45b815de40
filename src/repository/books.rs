//! Books repository: `/books` endpoints

use std::sync::Arc;

use serde_json::Value;

use super::{check_id, ApiRequest, Reply, Transport};
use crate::{
    error::{ClientError, ClientResult},
    models::{Book, BookInput, Paginated},
};

#[derive(Clone)]
pub struct BooksRepository {
    transport: Arc<dyn Transport>,
    page_size: Option<u32>,
}

impl BooksRepository {
    pub fn new(transport: Arc<dyn Transport>, page_size: Option<u32>) -> Self {
        Self { transport, page_size }
    }

    /// Get one page of books
    pub async fn list(&self, page: u32) -> ClientResult<Paginated<Book>> {
        let mut request = ApiRequest::get("/books").with_query("page", page);
        if let Some(limit) = self.page_size {
            request = request.with_query("limit", limit);
        }
        let response = self.transport.send(request).await?;
        Reply::check(response, "Book")?.page()
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: &str) -> ClientResult<Book> {
        check_id(id)?;
        let response = self.transport.send(ApiRequest::get(format!("/books/{}", id))).await?;
        let reply = Reply::check(response, "Book")?;
        // The service answers 200 with `data: null` for unknown ids
        if reply.envelope.data.is_null() {
            return Err(ClientError::NotFound(format!("Book with id {} not found", id)));
        }
        reply.data()
    }

    /// Create a new book
    pub async fn create(&self, book: &BookInput) -> ClientResult<Book> {
        let response = self
            .transport
            .send(ApiRequest::post("/books", to_body(book)?))
            .await?;
        Reply::check(response, "Book")?.data()
    }

    /// Update an existing book
    pub async fn update(&self, id: &str, book: &BookInput) -> ClientResult<Book> {
        check_id(id)?;
        let response = self
            .transport
            .send(ApiRequest::put(format!("/books/{}", id), to_body(book)?))
            .await?;
        let reply = Reply::check(response, "Book")?;
        if reply.envelope.data.is_null() {
            return Err(ClientError::NotFound(format!("Book with id {} not found", id)));
        }
        reply.data()
    }

    /// Delete a book
    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        check_id(id)?;
        let response = self.transport.send(ApiRequest::delete(format!("/books/{}", id))).await?;
        Reply::check(response, "Book")?;
        Ok(())
    }
}

fn to_body(book: &BookInput) -> ClientResult<Value> {
    serde_json::to_value(book)
        .map_err(|e| ClientError::Validation(format!("Failed to encode book: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Genre;
    use crate::repository::{ApiResponse, MockTransport};
    use reqwest::Method;
    use serde_json::json;

    fn book_json(id: &str, copies: u32) -> Value {
        json!({
            "_id": id,
            "title": "Dune",
            "author": "Frank Herbert",
            "genre": "SCIENCE",
            "isbn": "9780441013593",
            "description": "Desert planet politics.",
            "copies": copies,
            "available": copies > 0
        })
    }

    #[tokio::test]
    async fn test_list_sends_page_and_limit() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::GET
                    && req.path == "/books"
                    && req.query
                        == vec![
                            ("page".to_string(), "2".to_string()),
                            ("limit".to_string(), "5".to_string()),
                        ]
            })
            .times(1)
            .returning(|_| {
                Ok(ApiResponse {
                    status: 200,
                    body: json!({
                        "success": true,
                        "data": [book_json("a", 1)],
                        "meta": { "totalItems": 6, "totalPages": 2 }
                    }),
                })
            });

        let repo = BooksRepository::new(Arc::new(transport), Some(5));
        let page = repo.list(2).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.meta.total_pages, 2);
        assert!(!page.has_next(2));
    }

    #[tokio::test]
    async fn test_get_null_data_is_not_found() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(ApiResponse {
                status: 200,
                body: json!({ "success": true, "message": "Book retrieved successfully", "data": null }),
            })
        });

        let repo = BooksRepository::new(Arc::new(transport), None);
        let err = repo.get_by_id("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_posts_fields() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::POST
                    && req.path == "/books"
                    && req.body.as_ref().map(|b| b["genre"] == "HISTORY" && b["copies"] == 2)
                        == Some(true)
            })
            .times(1)
            .returning(|_| {
                Ok(ApiResponse {
                    status: 201,
                    body: json!({ "success": true, "data": book_json("new", 2) }),
                })
            });

        let repo = BooksRepository::new(Arc::new(transport), None);
        let input = BookInput::new("T", "A", Genre::History, "1", "long enough text", 2);
        let book = repo.create(&input).await.unwrap();
        assert_eq!(book.id, "new");
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(ClientError::Transport("connection refused".into())));

        let repo = BooksRepository::new(Arc::new(transport), None);
        assert_eq!(
            repo.delete("a").await.unwrap_err(),
            ClientError::Transport("connection refused".into())
        );
    }
}
