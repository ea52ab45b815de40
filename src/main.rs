//! Library client - command line front end
//!
//! Browse the catalog, manage books, borrow copies and view the borrow summary.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_client::{
    config::AppConfig,
    models::{Book, BookInput, BorrowInput},
    services::{MutationEvent, Outcome},
    LibraryClient,
};

#[derive(Parser)]
#[command(name = "library-client", version, about = "Library catalog and borrowing client")]
struct Cli {
    /// Override the API base path
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List books, one page at a time
    Books {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one book
    Book { id: String },
    /// Add a book to the catalog
    CreateBook(BookArgs),
    /// Edit a book; omitted fields keep their current value
    UpdateBook {
        id: String,
        #[command(flatten)]
        fields: BookPatchArgs,
    },
    /// Remove a book from the catalog
    DeleteBook { id: String },
    /// Borrow copies of a book
    Borrow {
        id: String,
        #[arg(long, default_value_t = 1)]
        quantity: i64,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: NaiveDate,
    },
    /// Borrowed quantities per book
    BorrowSummary,
}

#[derive(Args)]
struct BookArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    author: String,
    /// FICTION, NON_FICTION, SCIENCE, HISTORY, BIOGRAPHY or FANTASY
    #[arg(long, default_value = "FICTION")]
    genre: String,
    #[arg(long)]
    isbn: String,
    #[arg(long)]
    description: String,
    #[arg(long, default_value_t = 1)]
    copies: i64,
}

#[derive(Args)]
struct BookPatchArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    copies: Option<i64>,
}

impl From<BookArgs> for BookInput {
    fn from(args: BookArgs) -> Self {
        Self {
            title: args.title,
            author: args.author,
            genre: args.genre,
            isbn: args.isbn,
            description: args.description,
            copies: args.copies,
        }
    }
}

impl BookPatchArgs {
    fn apply(self, mut input: BookInput) -> BookInput {
        if let Some(title) = self.title {
            input.title = title;
        }
        if let Some(author) = self.author {
            input.author = author;
        }
        if let Some(genre) = self.genre {
            input.genre = genre;
        }
        if let Some(isbn) = self.isbn {
            input.isbn = isbn;
        }
        if let Some(description) = self.description {
            input.description = description;
        }
        if let Some(copies) = self.copies {
            input.copies = copies;
        }
        input
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url.clone() {
        config.api.base_url = url;
    }

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_client={}", config.logging.level).into());
    let json = config.logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::debug!("Using API at {}", config.api.base_url);

    let client = LibraryClient::new(config).context("Failed to create client")?;
    let mut events = client.events();

    let result = run(&client, cli.command).await;

    while let Ok(event) = events.try_recv() {
        notify(&event);
    }

    result
}

async fn run(client: &LibraryClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Books { page } => {
            let books = client.catalog().list_books(page).await?;
            for book in &books.items {
                print_row(book);
            }
            println!(
                "Page {} of {} ({} books)",
                page, books.meta.total_pages, books.meta.total_items
            );
        }
        Command::Book { id } => {
            let book = client.catalog().get_book(&id).await?.into_inner();
            print_details(&book);
        }
        Command::CreateBook(args) => {
            let book = client.catalog().create_book(args.into()).await?;
            print_details(&book);
        }
        Command::UpdateBook { id, fields } => {
            let current = client.catalog().get_book(&id).await?;
            let input = fields.apply(BookInput::from(&current.data));
            let book = client.catalog().update_book(&id, input).await?;
            print_details(&book);
        }
        Command::DeleteBook { id } => {
            client.catalog().delete_book(&id).await?;
        }
        Command::Borrow { id, quantity, due } => {
            // Prime the cache so the quantity is checked against current copies
            client.catalog().get_book(&id).await?;
            let record = client
                .borrows()
                .create_borrow(BorrowInput::new(id, quantity, due))
                .await?;
            println!(
                "Borrowed {} cop{} of {}, due {}",
                record.quantity,
                if record.quantity == 1 { "y" } else { "ies" },
                record.book,
                record.due_date.date_naive()
            );
        }
        Command::BorrowSummary => {
            let summary = client.borrows().list_borrow_summary().await?;
            for item in summary.iter() {
                println!("{:<40} {:<15} {:>5}", item.book.title, item.book.isbn, item.total_quantity);
            }
            let stats = client.borrows().borrow_stats().await?;
            println!(
                "{} books, {} copies borrowed, {:.1} per book",
                stats.total_books, stats.total_borrowed, stats.average_per_book
            );
            if let Some(top) = &stats.most_borrowed {
                println!("Most borrowed: {} ({})", top.book.title, top.total_quantity);
            }
        }
    }
    Ok(())
}

fn notify(event: &MutationEvent) {
    match &event.outcome {
        Outcome::Success => println!("✔ {} succeeded", event.operation),
        Outcome::Failure(e) => eprintln!("✘ {} failed: {}", event.operation, e),
    }
}

fn print_row(book: &Book) {
    println!(
        "{:<26} {:<40} {:<25} {:<12} {:>4} {}",
        book.id,
        book.title,
        book.author,
        book.genre.to_string(),
        book.copies,
        if book.available { "available" } else { "unavailable" }
    );
}

fn print_details(book: &Book) {
    println!("{} ({})", book.title, book.id);
    println!("  Author:      {}", book.author);
    println!("  Genre:       {}", book.genre);
    println!("  ISBN:        {}", book.isbn);
    println!("  Copies:      {}", book.copies);
    println!("  Available:   {}", if book.available { "yes" } else { "no" });
    println!("  Description: {}", book.description);
}
