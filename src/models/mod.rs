use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

// ── Spreadsheet cell ──────────────────────────────────────────────────────────

/// A single worksheet value as the store reads and writes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Decimals are stored as the nearest `f64` to their printed form.
    pub fn decimal(d: Decimal) -> Self {
        let printed = d.normalize().to_string();
        match printed.parse::<f64>() {
            Ok(f) => Cell::Number(f),
            Err(_) => Cell::Text(printed),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Canonical rendering used for exact-tuple comparison.
    pub fn key(&self) -> String {
        match self {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A record type that lives in its own sheet under a fixed header.
pub trait SheetRow {
    const HEADER: &'static [&'static str];

    fn to_cells(&self) -> Vec<Cell>;
}

// ── Exchange rate ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRateRecord {
    /// `{date}-{code}`; stable across re-fetches of the same publication.
    pub id: String,
    pub currency: String, // "USD/CNY", "EUR/CNY", ...
    pub rate: Decimal,
    pub date: String, // as published, e.g. "2025-07-01 9:15"
}

impl ExchangeRateRecord {
    /// Column of the `Date` value within [`SheetRow::HEADER`].
    pub const DATE_COL: usize = 3;
    pub const CURRENCY_COL: usize = 1;
    pub const RATE_COL: usize = 2;
}

impl SheetRow for ExchangeRateRecord {
    const HEADER: &'static [&'static str] = &["Id", "Currency", "Exchange Rate", "Date"];

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.id),
            Cell::text(&self.currency),
            Cell::decimal(self.rate),
            Cell::text(&self.date),
        ]
    }
}

/// One publication of the central parity table.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub last_date: String,
    pub records: Vec<ExchangeRateRecord>,
}

// ── Precious metal price ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metal {
    Gold,
    Silver,
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metal::Gold => "Gold",
            Metal::Silver => "Silver",
        })
    }
}

/// Benchmark pricing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Am,
    Pm,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Session::Am => "AM",
            Session::Pm => "PM",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetalPriceRecord {
    pub date: String,
    pub metal: Metal,
    pub session: Session,
    pub price: Decimal,
    pub unit: String, // normalized, e.g. "CNY/G"
}

impl SheetRow for MetalPriceRecord {
    const HEADER: &'static [&'static str] = &["date", "metal", "price_type", "price", "unit"];

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.date),
            Cell::text(self.metal.to_string()),
            Cell::text(self.session.to_string()),
            Cell::decimal(self.price),
            Cell::text(&self.unit),
        ]
    }
}

// ── Raw scraped rows ──────────────────────────────────────────────────────────

/// `ccpr.json` as served; everything optional until the cleaner has run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRatePayload {
    pub data: Option<RawRateHeader>,
    pub records: Vec<RawRateRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRateHeader {
    #[serde(rename = "lastDate")]
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRateRow {
    #[serde(rename = "vrtCode")]
    pub code: Option<String>,
    #[serde(rename = "vrtEName")]
    pub name: Option<String>,
    /// Published as a string, occasionally as a bare number.
    pub price: Option<serde_json::Value>,
}

/// One `li` price item from a metal block.
#[derive(Debug, Clone, Default)]
pub struct RawPriceItem {
    pub description: Option<String>,
    pub price: Option<String>,
}

/// One `div#dataStatisticsN` block.
#[derive(Debug, Clone)]
pub struct RawMetalBlock {
    pub metal: Metal,
    pub date_label: String,
    pub am: RawPriceItem,
    pub pm: RawPriceItem,
}
