pub mod errors;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod pacing;
pub mod progress;
pub mod providers;

pub use fetcher::{FailedSymbol, FetchOutcome, MarketDataFetcher};
pub use providers::{QuoteSource, SourceKind, SourceSettings, build_source};
