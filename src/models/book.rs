//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::{Validate, ValidationError};

// ---------------------------------------------------------------------------
// Genre
// ---------------------------------------------------------------------------

/// Book genre classification, as accepted by the catalog service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    Fiction,
    NonFiction,
    Science,
    History,
    Biography,
    Fantasy,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Fiction,
        Genre::NonFiction,
        Genre::Science,
        Genre::History,
        Genre::Biography,
        Genre::Fantasy,
    ];

    /// Wire value, e.g. `NON_FICTION`
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fiction => "FICTION",
            Genre::NonFiction => "NON_FICTION",
            Genre::Science => "SCIENCE",
            Genre::History => "HISTORY",
            Genre::Biography => "BIOGRAPHY",
            Genre::Fantasy => "FANTASY",
        }
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("Unknown genre: {}", s))
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Genre::Fiction => "Fiction",
            Genre::NonFiction => "Non-Fiction",
            Genre::Science => "Science",
            Genre::History => "History",
            Genre::Biography => "Biography",
            Genre::Fantasy => "Fantasy",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// Book as returned by the catalog service.
///
/// `available` is computed by the service from `copies`; the client only displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    pub description: String,
    pub copies: u32,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create or update book request.
///
/// `genre` stays a string so that form input outside the enumeration can be
/// rejected here rather than failing to parse earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BookInput {
    #[validate(custom(function = "validate_not_blank", message = "Title is required"))]
    pub title: String,
    #[validate(custom(function = "validate_not_blank", message = "Author is required"))]
    pub author: String,
    #[validate(custom(function = "validate_genre"))]
    pub genre: String,
    #[validate(custom(function = "validate_not_blank", message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,
    #[validate(range(min = 1, message = "Total copies should be greater than 0"))]
    pub copies: i64,
}

impl BookInput {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genre: Genre,
        isbn: impl Into<String>,
        description: impl Into<String>,
        copies: i64,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genre: genre.as_str().to_string(),
            isbn: isbn.into(),
            description: description.into(),
            copies,
        }
    }
}

impl From<&Book> for BookInput {
    /// Prefill an edit form from the current book
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.as_str().to_string(),
            isbn: book.isbn.clone(),
            description: book.description.clone(),
            copies: i64::from(book.copies),
        }
    }
}

/// Whitespace-only input counts as empty
fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

fn validate_genre(genre: &str) -> Result<(), ValidationError> {
    if genre.parse::<Genre>().is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("genre");
        err.message = Some("Genre is required".into());
        Err(err)
    }
}
