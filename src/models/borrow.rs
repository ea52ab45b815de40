//! Borrow model and aggregate summary types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Borrow record returned after a successful borrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Id of the borrowed book
    pub book: String,
    pub quantity: u32,
    pub due_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Borrow request
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct BorrowInput {
    #[validate(length(min = 1, message = "Book is required"))]
    pub book_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i64,
    pub due_date: NaiveDate,
}

impl BorrowInput {
    pub fn new(book_id: impl Into<String>, quantity: i64, due_date: NaiveDate) -> Self {
        Self {
            book_id: book_id.into(),
            quantity,
            due_date,
        }
    }
}

/// Body sent to `POST /borrow`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BorrowPayload<'a> {
    pub book: &'a str,
    pub quantity: i64,
    /// ISO 8601, midnight UTC of the due date
    pub due_date: String,
}

impl<'a> From<&'a BorrowInput> for BorrowPayload<'a> {
    fn from(input: &'a BorrowInput) -> Self {
        let due = input.due_date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            book: &input.book_id,
            quantity: input.quantity,
            due_date: due.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Title and ISBN of a borrowed book, as embedded in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDescriptor {
    pub title: String,
    pub isbn: String,
}

/// One row of the borrow summary, computed by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowSummaryItem {
    pub book: BookDescriptor,
    pub total_quantity: u64,
}

/// Totals shown above the borrow summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorrowStats {
    /// Number of distinct books with outstanding borrows
    pub total_books: usize,
    pub total_borrowed: u64,
    /// Rounded to one decimal
    pub average_per_book: f64,
    pub most_borrowed: Option<BorrowSummaryItem>,
}

impl BorrowStats {
    pub fn from_summary(items: &[BorrowSummaryItem]) -> Self {
        let total_borrowed: u64 = items.iter().map(|i| i.total_quantity).sum();
        let average_per_book = if items.is_empty() {
            0.0
        } else {
            (total_borrowed as f64 / items.len() as f64 * 10.0).round() / 10.0
        };
        // First maximum wins on ties
        let most_borrowed = items
            .iter()
            .fold(None::<&BorrowSummaryItem>, |best, item| match best {
                Some(b) if b.total_quantity >= item.total_quantity => Some(b),
                _ => Some(item),
            })
            .cloned();

        Self {
            total_books: items.len(),
            total_borrowed,
            average_per_book,
            most_borrowed,
        }
    }
}
