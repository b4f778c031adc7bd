// Pipeline processing: row filtering and column type normalization

pub mod date_normalize;
pub mod price_filter;

pub use date_normalize::{normalize_dates, parse_date, DateParsePolicy, NormalizeOutcome};
pub use price_filter::{filter_by_price, parse_price, PriceRange};
