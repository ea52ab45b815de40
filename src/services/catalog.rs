//! Catalog client: cached reads and invalidating writes for books

use validator::Validate;

use crate::{
    cache::{CacheKey, Cached, RequestCache, Subscription, Tag},
    error::{ClientError, ClientResult},
    models::{Book, BookInput, Paginated},
    repository::{books::BooksRepository, check_id},
    services::mutation::{Mutations, Operation},
};

pub const LIST_BOOKS: &str = "list-books";
pub const GET_BOOK: &str = "get-book";

#[derive(Clone)]
pub struct CatalogClient {
    repository: BooksRepository,
    cache: RequestCache,
    mutations: Mutations,
}

impl CatalogClient {
    pub fn new(repository: BooksRepository, cache: RequestCache, mutations: Mutations) -> Self {
        Self {
            repository,
            cache,
            mutations,
        }
    }

    pub fn list_books_key(page: u32) -> CacheKey {
        CacheKey::new(LIST_BOOKS).with_param("page", page)
    }

    pub fn get_book_key(id: &str) -> CacheKey {
        CacheKey::new(GET_BOOK).with_param("id", id)
    }

    /// Get one page of books (pages start at 1)
    pub async fn list_books(&self, page: u32) -> ClientResult<Cached<Paginated<Book>>> {
        if page == 0 {
            return Err(ClientError::Validation("page: must be at least 1".to_string()));
        }
        let repository = self.repository.clone();
        self.cache
            .read(Self::list_books_key(page), &[Tag::Books], move || async move {
                repository.list(page).await
            })
            .await
    }

    /// Get book by ID. Unknown ids fail with `NotFound`.
    pub async fn get_book(&self, id: &str) -> ClientResult<Cached<Book>> {
        check_id(id)?;
        let repository = self.repository.clone();
        let owned = id.to_string();
        self.cache
            .read(Self::get_book_key(id), &[Tag::Books], move || async move {
                repository.get_by_id(&owned).await
            })
            .await
    }

    /// Create a new book
    pub async fn create_book(&self, input: BookInput) -> ClientResult<Book> {
        if let Err(errors) = input.validate() {
            return Err(self.mutations.reject(Operation::CreateBook, errors.into()));
        }
        let repository = self.repository.clone();
        self.mutations
            .run(Operation::CreateBook, async move { repository.create(&input).await })
            .await
    }

    /// Update an existing book
    pub async fn update_book(&self, id: &str, input: BookInput) -> ClientResult<Book> {
        if let Err(e) = check_id(id) {
            return Err(self.mutations.reject(Operation::UpdateBook, e));
        }
        if let Err(errors) = input.validate() {
            return Err(self.mutations.reject(Operation::UpdateBook, errors.into()));
        }
        let repository = self.repository.clone();
        let id = id.to_string();
        self.mutations
            .run(Operation::UpdateBook, async move { repository.update(&id, &input).await })
            .await
    }

    /// Delete a book. Deleting an unknown id fails with `NotFound`.
    pub async fn delete_book(&self, id: &str) -> ClientResult<()> {
        if let Err(e) = check_id(id) {
            return Err(self.mutations.reject(Operation::DeleteBook, e));
        }
        let repository = self.repository.clone();
        let id = id.to_string();
        self.mutations
            .run(Operation::DeleteBook, async move { repository.delete(&id).await })
            .await
    }

    pub fn subscribe_list_books(&self, page: u32) -> Subscription {
        self.cache.subscribe(Self::list_books_key(page))
    }

    pub fn subscribe_book(&self, id: &str) -> Subscription {
        self.cache.subscribe(Self::get_book_key(id))
    }

    /// Copies of `id` according to whatever the cache last saw
    pub fn last_known_copies(&self, id: &str) -> Option<u32> {
        last_known_copies(&self.cache, id)
    }
}

/// Look the book up in its own entry first, then in any cached list page
pub(crate) fn last_known_copies(cache: &RequestCache, id: &str) -> Option<u32> {
    if let Some(book) = cache.peek::<Book>(&CatalogClient::get_book_key(id)) {
        return Some(book.copies);
    }
    cache
        .peek_all::<Paginated<Book>>(LIST_BOOKS)
        .into_iter()
        .flat_map(|page| page.items)
        .find(|book| book.id == id)
        .map(|book| book.copies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::CacheConfig;
    use crate::models::Genre;
    use crate::repository::{ApiResponse, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: MockTransport) -> CatalogClient {
        let cache = RequestCache::new(Arc::new(SystemClock), &CacheConfig::default());
        let mutations = Mutations::new(cache.clone(), 16);
        CatalogClient::new(BooksRepository::new(Arc::new(transport), None), cache, mutations)
    }

    fn valid_input() -> BookInput {
        BookInput::new("T", "A", Genre::Fiction, "123", "a valid description", 3)
    }

    fn page_body(copies: u32) -> serde_json::Value {
        json!({
            "success": true,
            "data": [{
                "_id": "x", "title": "T", "author": "A", "genre": "FICTION", "isbn": "123",
                "description": "a valid description", "copies": copies, "available": copies > 0
            }],
            "meta": { "totalItems": 1, "totalPages": 1 }
        })
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_transport() {
        // No expectations: any request would panic
        let client = client(MockTransport::new());

        let mut empty_title = valid_input();
        empty_title.title = String::new();
        let mut short_description = valid_input();
        short_description.description = "short".into();
        let mut no_copies = valid_input();
        no_copies.copies = 0;
        let mut bad_genre = valid_input();
        bad_genre.genre = "COOKING".into();

        for input in [empty_title, short_description, no_copies.clone(), bad_genre] {
            let err = client.create_book(input).await.unwrap_err();
            assert_eq!(err.code(), crate::error::ErrorCode::BadValue);
        }
        let err = client.update_book("x", no_copies).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_page_zero_is_rejected() {
        let client = client(MockTransport::new());
        tokio_test::assert_err!(client.list_books(0).await);
    }

    #[tokio::test]
    async fn test_list_is_cached() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(ApiResponse { status: 200, body: page_body(2) })
        });
        let client = client(transport);

        let first = client.list_books(1).await.unwrap();
        let second = client.list_books(1).await.unwrap();
        assert_eq!(first.data, second.data);
        assert_eq!(client.last_known_copies("x"), Some(2));
        assert_eq!(client.last_known_copies("y"), None);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_cache() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.path == "/books")
            .times(1)
            .returning(|_| Ok(ApiResponse { status: 200, body: page_body(1) }));
        transport
            .expect_send()
            .withf(|req| req.path == "/books/x")
            .times(1)
            .returning(|_| Err(ClientError::Transport("offline".into())));
        let client = client(transport);

        tokio_test::assert_ok!(client.list_books(1).await);
        tokio_test::assert_err!(client.delete_book("x").await);
        // Still served from cache; a second GET would violate `times(1)`
        tokio_test::assert_ok!(client.list_books(1).await);
    }
}
