//! HTML body of the daily summary email.

use crate::config::ReportConfig;
use crate::models::{Cell, MetalPriceRecord, Session};
use std::collections::HashMap;
use std::fmt::Write;

/// Everything the email body shows. `None`/absent entries render as
/// placeholders.
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub rate_date: Option<String>,
    pub rates: HashMap<String, Cell>,
    pub metals: Option<Vec<MetalPriceRecord>>,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn dated(title: &str, date: Option<&str>) -> String {
    match date {
        Some(d) if !d.is_empty() => format!("{} ({})", title, escape_html(d)),
        _ => title.to_string(),
    }
}

fn rate_items(config: &ReportConfig, rates: &HashMap<String, Cell>) -> String {
    let mut html = String::new();
    for code in &config.currencies {
        let code_html = escape_html(code);
        match rates.get(code).filter(|c| !c.is_empty()) {
            Some(rate) => {
                let _ = write!(
                    html,
                    "<li>{}/{}: <b>{}</b></li>",
                    code_html,
                    escape_html(&config.quote_currency),
                    escape_html(&rate.key())
                );
            }
            None => {
                let _ = write!(html, "<li>{} rate not found</li>", code_html);
            }
        }
    }
    html
}

/// PM rows only; returns the list items and the date of the first PM row.
fn metal_items(config: &ReportConfig, metals: Option<&[MetalPriceRecord]>) -> (String, Option<String>) {
    let pm: Vec<&MetalPriceRecord> = metals
        .unwrap_or_default()
        .iter()
        .filter(|r| r.session == Session::Pm)
        .collect();

    if pm.is_empty() {
        return (
            "<li>No gold or silver PM price data found</li>".to_string(),
            None,
        );
    }

    let mut html = String::new();
    for row in &pm {
        let _ = write!(
            html,
            "<li>{}/{} PM Price: <b>{} {}</b></li>",
            row.metal,
            escape_html(&config.quote_currency),
            row.price,
            escape_html(&row.unit)
        );
    }
    (html, Some(pm[0].date.clone()))
}

pub fn compose(config: &ReportConfig, sender_name: &str, data: &ReportData) -> String {
    let rates_html = rate_items(config, &data.rates);
    let (metals_html, metal_date) = metal_items(config, data.metals.as_deref());

    format!(
        r#"<html>
    <body>
        <p><b>{greeting}</b></p>
        <p>Please find today's foreign exchange rate and precious metal PM price report attached.</p>
        <p><b>{rates_title}:</b></p>
        <ul>
            {rates_html}
        </ul>
        <p><b>{metals_title}:</b></p>
        <ul>
            {metals_html}
        </ul>
        <p><b>Report Highlights:</b></p>
        <ul>
            <li>Rates are the most recent central parity entries published by the People's Bank of China</li>
            <li>Gold and silver PM prices are official Shanghai Gold Exchange benchmark prices</li>
            <li>Full data set available in the attached Excel file</li>
        </ul>
        <p>Please let me know if you need additional analysis or specific currency pairs.</p>
        <br>
        <p><b>Best Regards,</b></p>
        <p>{sender}<br>
        {title}</p>
    </body>
</html>
"#,
        greeting = escape_html(&config.greeting),
        rates_title = dated("Latest Key Currency Rates", data.rate_date.as_deref()),
        metals_title = dated("Latest Precious Metal PM Prices", metal_date.as_deref()),
        sender = escape_html(sender_name),
        title = escape_html(&config.sender_title),
    )
}
