pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fixtures;
pub mod http_client;
pub mod loader;
pub mod provider;
pub mod records;
pub mod schema;

pub use cache::{CacheKey, FileCache, MatchCache, MemoryCache};
pub use config::Settings;
pub use error::{DataError, RoundFailure};
pub use fetcher::{FetchOutcome, FetchReport, MatchFetcher};
pub use loader::{DataLoader, DataSource, LoadOutcome};
pub use records::{Dataset, Fixture, MatchRecord};
