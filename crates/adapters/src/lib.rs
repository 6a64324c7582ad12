//! herald adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain
//! ports:
//! - `feed`: HTTP feed source (reqwest + feed-rs)
//! - `store`: SQLite and in-memory article stores
//! - `outbox`: JSONL outbound announcement queues

mod feed_http;
pub mod outbox;
mod store_memory;
mod store_sqlite;

/// Re-exports for feed adapters
pub mod feed {
    pub use crate::feed_http::HttpFeedSource;
}

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryArticleStore;
    pub use crate::store_sqlite::SqliteArticleStore;
}
