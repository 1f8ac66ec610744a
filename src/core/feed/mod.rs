pub mod codec;
pub mod fetcher;
pub mod parser;
pub mod types;

pub use fetcher::{FeedLoader, LoadError};
pub use types::{Article, Feed, FeedMeta};
