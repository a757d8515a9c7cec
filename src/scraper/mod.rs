pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::SourcesConfig;
use crate::models::{MetalPriceRecord, RateSnapshot};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use self::cleaner::{clean_metal_blocks, clean_rate_payload};
use self::http_client::HttpClient;
use self::parsers::{parse_metal_page, parse_rate_payload};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected payload: {0}")]
    Parse(String),
}

// ── Source traits ─────────────────────────────────────────────────────────────

/// Central parity rates.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateSnapshot, FetchError>;
}

/// Gold/silver benchmark prices.
#[async_trait]
pub trait MetalPriceSource: Send + Sync {
    async fn fetch_prices(&self) -> Result<Vec<MetalPriceRecord>, FetchError>;
}

// ── chinamoney.com.cn ─────────────────────────────────────────────────────────

pub struct ChinaMoneyScraper {
    client: HttpClient,
    url: String,
}

impl ChinaMoneyScraper {
    pub fn new(config: &SourcesConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(
                &config.user_agent,
                Some(Duration::from_secs(config.rates_timeout_secs)),
            )?,
            url: config.rates_url.clone(),
        })
    }
}

#[async_trait]
impl ExchangeRateSource for ChinaMoneyScraper {
    async fn fetch_rates(&self) -> Result<RateSnapshot, FetchError> {
        let body = self.client.get_text(&self.url).await?;
        let snapshot = clean_rate_payload(parse_rate_payload(&body)?)?;
        info!(
            last_date = %snapshot.last_date,
            records = snapshot.records.len(),
            "Fetched central parity rates"
        );
        Ok(snapshot)
    }
}

// ── sge.com.cn ────────────────────────────────────────────────────────────────

pub struct SgeScraper {
    client: HttpClient,
    url: String,
}

impl SgeScraper {
    pub fn new(config: &SourcesConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(
                &config.user_agent,
                config.metals_timeout_secs.map(Duration::from_secs),
            )?,
            url: config.metals_url.clone(),
        })
    }
}

#[async_trait]
impl MetalPriceSource for SgeScraper {
    async fn fetch_prices(&self) -> Result<Vec<MetalPriceRecord>, FetchError> {
        let html = self.client.get_text(&self.url).await?;
        let blocks = parse_metal_page(&html)?;
        let rows = clean_metal_blocks(&blocks)?;
        debug!("{} metal price rows: {:?}", rows.len(), rows);
        Ok(rows)
    }
}
