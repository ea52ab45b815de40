//! Borrow client: borrowing books and the borrow summary

use validator::Validate;

use crate::{
    cache::{CacheKey, Cached, RequestCache, Subscription, Tag},
    error::{ClientError, ClientResult},
    models::{BorrowInput, BorrowRecord, BorrowStats, BorrowSummaryItem},
    repository::borrows::BorrowsRepository,
    services::{
        catalog::last_known_copies,
        mutation::{Mutations, Operation},
    },
};

pub const BORROW_SUMMARY: &str = "borrow-summary";

#[derive(Clone)]
pub struct BorrowClient {
    repository: BorrowsRepository,
    cache: RequestCache,
    mutations: Mutations,
}

impl BorrowClient {
    pub fn new(repository: BorrowsRepository, cache: RequestCache, mutations: Mutations) -> Self {
        Self {
            repository,
            cache,
            mutations,
        }
    }

    pub fn borrow_summary_key() -> CacheKey {
        CacheKey::new(BORROW_SUMMARY)
    }

    /// Borrow copies of a book.
    ///
    /// The quantity is checked against the copies last seen in the cache;
    /// the service still has the final word. On success both the borrow
    /// summary and the catalog are invalidated.
    pub async fn create_borrow(&self, input: BorrowInput) -> ClientResult<BorrowRecord> {
        if let Err(e) = self.check(&input) {
            return Err(self.mutations.reject(Operation::CreateBorrow, e));
        }
        let repository = self.repository.clone();
        self.mutations
            .run(Operation::CreateBorrow, async move { repository.create(&input).await })
            .await
    }

    fn check(&self, input: &BorrowInput) -> ClientResult<()> {
        input.validate()?;

        let today = self.cache.clock().today();
        if input.due_date < today {
            return Err(ClientError::Validation(format!(
                "due_date: Due date must be today or later ({})",
                today
            )));
        }

        if let Some(copies) = last_known_copies(&self.cache, &input.book_id) {
            if input.quantity > i64::from(copies) {
                return Err(ClientError::Validation(format!(
                    "quantity: Only {} copies available",
                    copies
                )));
            }
        }
        Ok(())
    }

    /// Borrowed quantities per book
    pub async fn list_borrow_summary(&self) -> ClientResult<Cached<Vec<BorrowSummaryItem>>> {
        let repository = self.repository.clone();
        self.cache
            .read(Self::borrow_summary_key(), &[Tag::Borrows], move || async move {
                repository.summary().await
            })
            .await
    }

    /// Totals over the borrow summary
    pub async fn borrow_stats(&self) -> ClientResult<Cached<BorrowStats>> {
        let summary = self.list_borrow_summary().await?;
        Ok(summary.map(|items| BorrowStats::from_summary(&items)))
    }

    pub fn subscribe_summary(&self) -> Subscription {
        self.cache.subscribe(Self::borrow_summary_key())
    }
}
