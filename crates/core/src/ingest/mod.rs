pub mod error;
pub mod macro_data;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod series;
pub mod types;
pub mod valuation;

pub use error::FetchError;
pub use macro_data::MacroFetcher;
pub use provider::{HttpJsonProvider, RecordSource};
pub use retry::RetryPolicy;
pub use series::{DateRange, SeriesFetcher};
pub use valuation::ValuationFetcher;
