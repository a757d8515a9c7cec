//! Pipeline orchestrator: ties scrapers → workbook → report email together.
//!
//! One `run_once()` is one scheduled cycle:
//!   1. Fetch central parity rates; skip the store when the published date is
//!      already the last stored one, otherwise append the novel rows.
//!   2. Fetch gold/silver benchmark prices and append the novel rows.
//!   3. Read the newest rate per requested currency back from the workbook.
//!   4. Compose the HTML summary and mail it with the workbook attached.
//!
//! No stage failure escapes: each is logged and turned into "no data" so the
//! report still goes out and the next cycle starts fresh.

use crate::config::{AppConfig, ReportConfig, StorageConfig};
use crate::mailer::{Email, Mailer, SmtpMailer};
use crate::models::{Cell, ExchangeRateRecord, MetalPriceRecord};
use crate::report::{ReportData, compose};
use crate::scraper::{ChinaMoneyScraper, ExchangeRateSource, MetalPriceSource, SgeScraper};
use crate::storage::{self, AppendOutcome};
use crate::utils::Timer;
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{error, info, warn};

pub struct Pipeline {
    storage: StorageConfig,
    report: ReportConfig,
    sender_name: String,
    rates: Box<dyn ExchangeRateSource>,
    metals: Box<dyn MetalPriceSource>,
    mailer: Box<dyn Mailer>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        rates: Box<dyn ExchangeRateSource>,
        metals: Box<dyn MetalPriceSource>,
        mailer: Box<dyn Mailer>,
    ) -> Self {
        Self {
            storage: config.storage.clone(),
            report: config.report.clone(),
            sender_name: config.mail.sender_name.clone(),
            rates,
            metals,
            mailer,
        }
    }

    /// Wire up the live scrapers and SMTP transport.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let rates = ChinaMoneyScraper::new(&config.sources).context("Failed to build rate scraper")?;
        let metals = SgeScraper::new(&config.sources).context("Failed to build metal scraper")?;
        let mailer = SmtpMailer::new(&config.mail).context("Failed to build SMTP mailer")?;
        Ok(Self::new(config, Box::new(rates), Box::new(metals), Box::new(mailer)))
    }

    pub async fn run_once(&self) -> RunSummary {
        let _t = Timer::start("Exchange rate and gold/silver price email task");
        let mut summary = RunSummary::default();

        // ── 1. Exchange rates ─────────────────────────────────────────────────
        match self.update_exchange_rates().await {
            Ok(outcome) => summary.rates = Some(outcome),
            Err(e) => warn!("Exchange rate update failed: {:#}", e),
        }

        // ── 2. Metal prices ───────────────────────────────────────────────────
        let metals = match self.metals.fetch_prices().await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Metal price fetch failed: {}", e);
                None
            }
        };
        if let Some(rows) = &metals {
            match self.store_metal_prices(rows) {
                Ok(outcome) => summary.metals = Some(outcome),
                Err(e) => warn!("Metal price store update failed: {:#}", e),
            }
        }

        // ── 3. Read back ──────────────────────────────────────────────────────
        let data = ReportData {
            rate_date: self.stored_rate_date(),
            rates: self.latest_rates(),
            metals,
        };

        // ── 4. Compose + send ─────────────────────────────────────────────────
        let email = Email {
            subject: self.report.subject.clone(),
            html_body: compose(&self.report, &self.sender_name, &data),
            attachment: self
                .storage
                .workbook_path
                .exists()
                .then(|| self.storage.workbook_path.clone()),
        };

        match self.mailer.send(&email).await {
            Ok(()) => {
                info!("Email sent successfully");
                summary.email_sent = true;
            }
            Err(e) => error!("Failed to send email: {:#}", e),
        }

        info!(
            rates = ?summary.rates,
            metals = ?summary.metals,
            email_sent = summary.email_sent,
            "Task finished"
        );
        summary
    }

    async fn update_exchange_rates(&self) -> Result<AppendOutcome> {
        let snapshot = self.rates.fetch_rates().await?;
        let path = &self.storage.workbook_path;
        let sheet = &self.storage.rates_sheet;

        let stored = storage::last_cell(path, sheet, ExchangeRateRecord::DATE_COL)
            .context("Failed to read last stored rate date")?;
        if stored.is_some_and(|d| d.key() == snapshot.last_date) {
            info!(last_date = %snapshot.last_date, "Exchange rate data is already the latest");
            return Ok(AppendOutcome::UpToDate);
        }

        storage::append_rows(path, sheet, &snapshot.records)
    }

    fn store_metal_prices(&self, rows: &[MetalPriceRecord]) -> Result<AppendOutcome> {
        storage::append_rows(
            &self.storage.workbook_path,
            &self.storage.metals_sheet,
            rows,
        )
    }

    fn latest_rates(&self) -> HashMap<String, Cell> {
        storage::latest_values(
            &self.storage.workbook_path,
            &self.storage.rates_sheet,
            &self.report.currencies,
            ExchangeRateRecord::CURRENCY_COL,
            ExchangeRateRecord::RATE_COL,
        )
        .unwrap_or_else(|e| {
            warn!("Error reading rates: {:#}", e);
            HashMap::new()
        })
    }

    fn stored_rate_date(&self) -> Option<String> {
        match storage::last_cell(
            &self.storage.workbook_path,
            &self.storage.rates_sheet,
            ExchangeRateRecord::DATE_COL,
        ) {
            Ok(cell) => cell.map(|c| c.key()),
            Err(e) => {
                warn!("Error reading exchange rate date: {:#}", e);
                None
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    /// `None` when the rate fetch or store update failed.
    pub rates: Option<AppendOutcome>,
    /// `None` when the metal fetch or store update failed.
    pub metals: Option<AppendOutcome>,
    pub email_sent: bool,
}
