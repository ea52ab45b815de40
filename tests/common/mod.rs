//! In-memory stand-in for the catalog service

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Notify;

use library_client::{
    clock::ManualClock,
    config::AppConfig,
    error::{ClientError, ClientResult},
    models::{Book, Genre},
    repository::{ApiRequest, ApiResponse, Transport},
    LibraryClient,
};

const PAGE_SIZE: usize = 10;

#[derive(Default)]
struct LibraryState {
    books: Vec<Book>,
    borrowed: Vec<(String, u64)>,
    next_id: u64,
}

/// Behaves like the real service: `{success, data, meta}` envelopes,
/// 404 for unknown ids, copies decremented by borrows.
#[derive(Default)]
pub struct FakeLibrary {
    state: Mutex<LibraryState>,
    requests: Mutex<Vec<ApiRequest>>,
    offline: AtomicBool,
    held_get: Mutex<Option<Arc<Notify>>>,
}

impl FakeLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, id: &str, title: &str, copies: u32) {
        let mut state = self.state.lock().unwrap();
        state.books.push(Book {
            id: id.to_string(),
            title: title.to_string(),
            author: "Seed Author".to_string(),
            genre: Genre::Fiction,
            isbn: format!("978{}", id),
            description: "Seeded for tests".to_string(),
            copies,
            available: copies > 0,
            created_at: None,
            updated_at: None,
        });
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay the answer to the next GET until the returned gate is notified.
    /// The answer reflects the state at the time the request arrived.
    pub fn hold_next_get(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.held_get.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Whether the GET set up by `hold_next_get` has yet to arrive
    pub fn awaiting_held_get(&self) -> bool {
        self.held_get.lock().unwrap().is_some()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.state.lock().unwrap();
        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["books"]) => {
                let page: usize = query(request, "page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let total = state.books.len();
                let items: Vec<&Book> = state.books.iter().skip((page - 1) * PAGE_SIZE).take(PAGE_SIZE).collect();
                ok(200, json!({
                    "success": true,
                    "data": items,
                    "meta": { "totalItems": total, "totalPages": total.div_ceil(PAGE_SIZE) }
                }))
            }
            ("GET", ["books", id]) => match state.books.iter().find(|b| b.id == *id) {
                Some(book) => ok(200, json!({ "success": true, "data": book })),
                None => not_found(),
            },
            ("POST", ["books"]) => {
                let body = request.body.clone().unwrap_or(Value::Null);
                state.next_id += 1;
                let book = book_from_body(format!("book-{}", state.next_id), &body);
                state.books.push(book.clone());
                ok(201, json!({ "success": true, "message": "Book created successfully", "data": book }))
            }
            ("PUT", ["books", id]) => {
                let body = request.body.clone().unwrap_or(Value::Null);
                match state.books.iter_mut().find(|b| b.id == *id) {
                    Some(book) => {
                        *book = book_from_body(book.id.clone(), &body);
                        ok(200, json!({ "success": true, "data": book }))
                    }
                    None => not_found(),
                }
            }
            ("DELETE", ["books", id]) => {
                let before = state.books.len();
                state.books.retain(|b| b.id != *id);
                if state.books.len() == before {
                    not_found()
                } else {
                    ok(200, json!({ "success": true, "message": "Book deleted successfully", "data": null }))
                }
            }
            ("GET", ["borrow"]) => {
                let data: Vec<Value> = state
                    .borrowed
                    .iter()
                    .filter_map(|(id, qty)| {
                        state.books.iter().find(|b| b.id == *id).map(|b| {
                            json!({ "book": { "title": b.title, "isbn": b.isbn }, "totalQuantity": qty })
                        })
                    })
                    .collect();
                ok(200, json!({ "success": true, "data": data }))
            }
            ("POST", ["borrow"]) => {
                let body = request.body.clone().unwrap_or(Value::Null);
                let id = body["book"].as_str().unwrap_or_default().to_string();
                let quantity = body["quantity"].as_u64().unwrap_or(0);
                let Some(book) = state.books.iter_mut().find(|b| b.id == id) else {
                    return not_found();
                };
                if quantity == 0 || quantity > u64::from(book.copies) {
                    // The real service reports this with 200 and success=false
                    return ok(200, json!({ "success": false, "message": "Not enough copies available" }));
                }
                book.copies -= quantity as u32;
                book.available = book.copies > 0;
                match state.borrowed.iter_mut().find(|(b, _)| *b == id) {
                    Some((_, total)) => *total += quantity,
                    None => state.borrowed.push((id.clone(), quantity)),
                }
                ok(201, json!({
                    "success": true,
                    "message": "Book borrowed successfully",
                    "data": { "_id": format!("borrow-{}", id), "book": id, "quantity": quantity, "dueDate": body["dueDate"] }
                }))
            }
            _ => ok(404, json!({ "success": false, "message": "Route not found" })),
        }
    }
}

#[async_trait]
impl Transport for FakeLibrary {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        // Let concurrent callers interleave as they would over a network
        tokio::task::yield_now().await;
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        let response = self.handle(&request);
        let held = if request.method == Method::GET {
            self.held_get.lock().unwrap().take()
        } else {
            None
        };
        if let Some(gate) = held {
            gate.notified().await;
        }
        Ok(response)
    }
}

fn query<'a>(request: &'a ApiRequest, key: &str) -> Option<&'a str> {
    request.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn ok(status: u16, body: Value) -> ApiResponse {
    ApiResponse { status, body }
}

fn not_found() -> ApiResponse {
    ok(404, json!({ "success": false, "message": "Book not found" }))
}

fn book_from_body(id: String, body: &Value) -> Book {
    let copies = body["copies"].as_u64().unwrap_or(0) as u32;
    Book {
        id,
        title: body["title"].as_str().unwrap_or_default().to_string(),
        author: body["author"].as_str().unwrap_or_default().to_string(),
        genre: body["genre"].as_str().and_then(|g| g.parse().ok()).unwrap_or(Genre::Fiction),
        isbn: body["isbn"].as_str().unwrap_or_default().to_string(),
        description: body["description"].as_str().unwrap_or_default().to_string(),
        copies,
        available: copies > 0,
        created_at: None,
        updated_at: None,
    }
}

/// Fixed "now" for due-date checks: 2026-10-15 12:00 UTC
pub fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap())
}

pub fn client(library: &Arc<FakeLibrary>) -> LibraryClient {
    LibraryClient::with_transport(AppConfig::default(), library.clone(), Arc::new(clock()))
}
