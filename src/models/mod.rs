//! Data models for the library client

pub mod book;
pub mod borrow;
pub mod envelope;

// Re-export commonly used types
pub use book::{Book, BookInput, Genre};
pub use borrow::{BookDescriptor, BorrowInput, BorrowRecord, BorrowStats, BorrowSummaryItem};
pub use envelope::{ApiEnvelope, PageMeta, Paginated};
