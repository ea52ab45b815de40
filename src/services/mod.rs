//! Client services: typed operations on top of the request cache

pub mod borrows;
pub mod catalog;
pub mod mutation;

use crate::{cache::RequestCache, repository::Repository};

pub use borrows::BorrowClient;
pub use catalog::CatalogClient;
pub use mutation::{MutationEvent, MutationStatus, Mutations, Operation, Outcome};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: CatalogClient,
    pub borrows: BorrowClient,
    pub mutations: Mutations,
    pub cache: RequestCache,
}

impl Services {
    /// Create all services over one shared cache
    pub fn new(repository: Repository, cache: RequestCache, event_capacity: usize) -> Self {
        let mutations = Mutations::new(cache.clone(), event_capacity);
        Self {
            catalog: CatalogClient::new(repository.books, cache.clone(), mutations.clone()),
            borrows: BorrowClient::new(repository.borrows, cache.clone(), mutations.clone()),
            mutations,
            cache,
        }
    }
}
