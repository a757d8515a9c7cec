use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
    pub report: ReportConfig,
    pub mail: MailConfig,
}

/// Remote endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub rates_url: String,
    pub rates_timeout_secs: u64,
    pub metals_url: String,
    /// The metals page is fetched without a timeout unless one is set.
    pub metals_timeout_secs: Option<u64>,
    pub user_agent: String,
}

/// Workbook location and sheet names
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub workbook_path: PathBuf,
    pub rates_sheet: String,
    pub metals_sheet: String,
}

/// Daily trigger
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock time, `HH:MM` or `HH:MM:SS`.
    pub time: String,
    pub timezone: Tz,
    pub poll_interval_secs: u64,
}

/// Email body content
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub currencies: Vec<String>,
    pub quote_currency: String,
    pub subject: String,
    pub greeting: String,
    pub sender_title: String,
}

/// SMTP transport
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub starttls: bool,
    pub username: String,
    pub password: String,
    pub sender_email: String,
    pub sender_name: String,
    pub recipients: Vec<String>,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            rates_url: "https://www.chinamoney.com.cn/r/cms/www/chinamoney/data/fx/ccpr.json"
                .to_string(),
            rates_timeout_secs: 10,
            metals_url: "https://www.sge.com.cn/".to_string(),
            metals_timeout_secs: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from("Financial_Data.xlsx"),
            rates_sheet: "Exchange_Rate".to_string(),
            metals_sheet: "Precious_Metal_Prices".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: "09:30".to_string(),
            timezone: chrono_tz::Asia::Shanghai,
            poll_interval_secs: 60,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            currencies: vec!["USD".to_string(), "EUR".to_string()],
            quote_currency: "CNY".to_string(),
            subject: "Daily Exchange Rate & Gold/Silver PM Price Report".to_string(),
            greeting: "Dear Colleagues,".to_string(),
            sender_title: "Financial Data Analyst".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.qq.com".to_string(),
            smtp_port: 465,
            starttls: false,
            username: String::new(),
            password: String::new(),
            sender_email: String::new(),
            sender_name: "Financial Data Collector".to_string(),
            recipients: Vec::new(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("FINDATA")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("mail.recipients")
                    .with_list_parse_key("report.currencies"),
            )
            .build()
            .context("Failed to assemble configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_published_store_layout() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.storage.workbook_path, PathBuf::from("Financial_Data.xlsx"));
        assert_eq!(cfg.storage.rates_sheet, "Exchange_Rate");
        assert_eq!(cfg.storage.metals_sheet, "Precious_Metal_Prices");
        assert_eq!(cfg.schedule.time, "09:30");
        assert_eq!(cfg.schedule.timezone, chrono_tz::Asia::Shanghai);
        assert_eq!(cfg.schedule.poll_interval_secs, 60);
        assert_eq!(cfg.sources.rates_timeout_secs, 10);
        assert!(cfg.sources.metals_timeout_secs.is_none());
    }

    #[test]
    fn partial_toml_keeps_section_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[schedule]\ntime = \"18:00\"\ntimezone = \"Europe/Berlin\"\n\n[mail]\nrecipients = [\"a@example.com\"]\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.schedule.time, "18:00");
        assert_eq!(cfg.schedule.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(cfg.schedule.poll_interval_secs, 60);
        assert_eq!(cfg.mail.recipients, vec!["a@example.com".to_string()]);
        assert_eq!(cfg.mail.smtp_port, 465);
        assert_eq!(cfg.report.currencies, vec!["USD", "EUR"]);
    }
}
