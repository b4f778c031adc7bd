use crate::error::Result;
use crate::pipeline::table::{Table, Value};

/// Closed interval `[min, max]` of accepted listing prices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// NaN never satisfies either comparison.
    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }

    /// An inverted range is allowed and selects nothing
    pub fn is_empty(&self) -> bool {
        self.min > self.max || self.min.is_nan() || self.max.is_nan()
    }
}

/// Numeric reading of a price cell; missing and non-numeric cells have none
pub fn parse_price(value: &Value) -> Option<f64> {
    value.as_text().and_then(|s| s.trim().parse::<f64>().ok())
}

/// Drop every row whose price is outside `range` or is not a number.
pub fn filter_by_price(table: Table, price_column: &str, range: PriceRange) -> Result<Table> {
    let idx = table.require_column(price_column)?;
    Ok(table.filter_rows(|row| {
        parse_price(&row.values[idx])
            .map(|price| range.contains(price))
            .unwrap_or(false)
    }))
}
