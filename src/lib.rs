//! Library catalog client
//!
//! Typed access to a remote library catalog and borrowing service, with a
//! shared request cache that deduplicates reads and is invalidated by tag
//! when writes succeed.

use std::sync::Arc;

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{ClientError, ClientResult};

use cache::RequestCache;
use clock::{Clock, SystemClock};
use repository::{HttpTransport, Repository, Transport};
use services::{BorrowClient, CatalogClient, MutationEvent, Services};

/// Client state shared by every front end
#[derive(Clone)]
pub struct LibraryClient {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
}

impl LibraryClient {
    /// Client talking HTTP to `config.api.base_url`
    pub fn new(config: AppConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(&config.api)?;
        Ok(Self::with_transport(config, Arc::new(transport), Arc::new(SystemClock)))
    }

    /// Client over any transport and clock
    pub fn with_transport(config: AppConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let cache = RequestCache::new(clock, &config.cache);
        let repository = Repository::new(transport, &config.api);
        let services = Services::new(repository, cache, config.cache.event_capacity);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.services.catalog
    }

    pub fn borrows(&self) -> &BorrowClient {
        &self.services.borrows
    }

    pub fn cache(&self) -> &RequestCache {
        &self.services.cache
    }

    pub fn events(&self) -> tokio::sync::broadcast::Receiver<MutationEvent> {
        self.services.mutations.events()
    }
}
