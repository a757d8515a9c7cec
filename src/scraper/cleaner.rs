use super::FetchError;
use crate::models::{
    ExchangeRateRecord, MetalPriceRecord, RateSnapshot, RawMetalBlock, RawPriceItem,
    RawRatePayload, Session,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

/// Prefix of the date label in each metal block.
const DATE_PREFIX: &str = "行情日期：";

/// Localized unit → normalized unit.
const UNIT_TABLE: &[(&str, &str)] = &[
    ("元/克", "CNY/G"),
    ("元/千克", "CNY/KG"),
    ("元/吨", "CNY/ton"),
    ("元/盎司", "CNY/oz"),
    ("元/公斤", "CNY/KG"),
];

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse a price: strip thousands separators and whitespace.
/// "7.1586" → 7.1586 | "8,807" → 8807 | "--" → None
pub fn parse_price(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "--" {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Unknown units come back unchanged.
pub fn unit_to_en(unit: &str) -> String {
    UNIT_TABLE
        .iter()
        .find(|(local, _)| *local == unit)
        .map(|(_, en)| en.to_string())
        .unwrap_or_else(|| unit.to_string())
}

/// Text between the first pair of parentheses, full-width first.
/// "上海金午盘价（元/克）" → "元/克"
pub fn extract_unit(description: &str) -> Option<&str> {
    [('（', '）'), ('(', ')')].iter().find_map(|(open, close)| {
        let start = description.find(*open)? + open.len_utf8();
        let len = description[start..].find(*close)?;
        Some(description[start..start + len].trim())
    })
}

pub fn strip_date_prefix(label: &str) -> String {
    label.trim().replace(DATE_PREFIX, "").trim().to_string()
}

// ── Rate payload → RateSnapshot ───────────────────────────────────────────────

pub fn clean_rate_payload(payload: RawRatePayload) -> Result<RateSnapshot, FetchError> {
    let last_date = payload
        .data
        .and_then(|d| d.last_date)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| FetchError::Parse("rate payload has no data.lastDate".into()))?;

    let mut records = Vec::with_capacity(payload.records.len());
    for row in payload.records {
        let (Some(code), Some(name)) = (row.code, row.name) else {
            warn!("Skipping rate record without vrtCode/vrtEName");
            continue;
        };

        let rate = match &row.price {
            Some(serde_json::Value::String(s)) => parse_price(s),
            Some(serde_json::Value::Number(n)) => parse_price(&n.to_string()),
            _ => None,
        };
        let Some(rate) = rate else {
            warn!("Invalid rate {:?} for {} on {}", row.price, name, last_date);
            continue;
        };

        records.push(ExchangeRateRecord {
            id: format!("{}-{}", last_date, code.trim()),
            currency: name.trim().to_string(),
            rate,
            date: last_date.clone(),
        });
    }

    if records.is_empty() {
        return Err(FetchError::Parse(format!(
            "rate payload for {} has no usable records",
            last_date
        )));
    }

    Ok(RateSnapshot { last_date, records })
}

// ── Metal block → 2 rows ──────────────────────────────────────────────────────

fn clean_price_item(
    block: &RawMetalBlock,
    date: &str,
    session: Session,
    item: &RawPriceItem,
) -> Result<MetalPriceRecord, FetchError> {
    let price = item
        .price
        .as_deref()
        .and_then(parse_price)
        .ok_or_else(|| {
            FetchError::Parse(format!("{} {} price missing or invalid", block.metal, session))
        })?;

    let unit = item
        .description
        .as_deref()
        .and_then(extract_unit)
        .map(unit_to_en)
        .unwrap_or_default();

    Ok(MetalPriceRecord {
        date: date.to_string(),
        metal: block.metal,
        session,
        price,
        unit,
    })
}

pub fn clean_metal_blocks(blocks: &[RawMetalBlock]) -> Result<Vec<MetalPriceRecord>, FetchError> {
    let mut rows = Vec::with_capacity(blocks.len() * 2);
    for block in blocks {
        let date = strip_date_prefix(&block.date_label);
        rows.push(clean_price_item(block, &date, Session::Am, &block.am)?);
        rows.push(clean_price_item(block, &date, Session::Pm, &block.pm)?);
    }
    Ok(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metal, RawRateHeader, RawRateRow};
    use crate::scraper::parsers::{fixtures, parse_metal_page, parse_rate_payload};

    #[test]
    fn test_unit_to_en() {
        assert_eq!(unit_to_en("元/克"), "CNY/G");
        assert_eq!(unit_to_en("元/千克"), "CNY/KG");
        assert_eq!(unit_to_en("元/公斤"), "CNY/KG");
        assert_eq!(unit_to_en("元/盎司"), "CNY/oz");
        assert_eq!(unit_to_en("美元/盎司"), "美元/盎司");
    }

    #[test]
    fn test_extract_unit() {
        assert_eq!(extract_unit("上海金午盘价（元/克）"), Some("元/克"));
        assert_eq!(extract_unit("Shanghai Gold PM (CNY/G)"), Some("CNY/G"));
        assert_eq!(extract_unit("上海金午盘价"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("770.51"), Decimal::from_str("770.51").ok());
        assert_eq!(parse_price(" 8,807 "), Decimal::from_str("8807").ok());
        assert_eq!(parse_price("--"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_clean_metal_page_yields_four_rows() {
        let blocks = parse_metal_page(fixtures::SGE_PAGE).unwrap();
        let rows = clean_metal_blocks(&blocks).unwrap();

        assert_eq!(rows.len(), 4);
        let summary: Vec<(Metal, Session, String, String)> = rows
            .iter()
            .map(|r| (r.metal, r.session, r.price.to_string(), r.unit.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Metal::Gold, Session::Am, "770.51".into(), "CNY/G".into()),
                (Metal::Gold, Session::Pm, "772.64".into(), "CNY/G".into()),
                (Metal::Silver, Session::Am, "8807".into(), "CNY/KG".into()),
                (Metal::Silver, Session::Pm, "8822".into(), "CNY/KG".into()),
            ]
        );
        assert!(rows.iter().all(|r| r.date == "2025-07-01"));
    }

    #[test]
    fn test_missing_price_fails_block() {
        let mut blocks = parse_metal_page(fixtures::SGE_PAGE).unwrap();
        blocks[1].pm.price = None;
        assert!(matches!(clean_metal_blocks(&blocks), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_clean_rate_payload_builds_stable_ids() {
        let payload = parse_rate_payload(fixtures::RATE_JSON).unwrap();
        let snapshot = clean_rate_payload(payload).unwrap();

        assert_eq!(snapshot.last_date, "2025-07-01 9:15");
        assert_eq!(snapshot.records.len(), 3);
        assert_eq!(snapshot.records[0].id, "2025-07-01 9:15-USD/CNY");
        assert_eq!(snapshot.records[0].currency, "USD/CNY");
        assert_eq!(snapshot.records[2].rate, Decimal::from_str("4.9588").unwrap());

        let again = clean_rate_payload(parse_rate_payload(fixtures::RATE_JSON).unwrap()).unwrap();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_clean_rate_payload_skips_bad_rows() {
        let payload = RawRatePayload {
            data: Some(RawRateHeader {
                last_date: Some("2025-07-02 9:15".into()),
            }),
            records: vec![
                RawRateRow {
                    code: Some("USD/CNY".into()),
                    name: Some("USD/CNY".into()),
                    price: Some(serde_json::json!("n/a")),
                },
                RawRateRow {
                    code: None,
                    name: Some("EUR/CNY".into()),
                    price: Some(serde_json::json!("8.4")),
                },
                RawRateRow {
                    code: Some("GBP/CNY".into()),
                    name: Some("GBP/CNY".into()),
                    price: Some(serde_json::json!("9.7")),
                },
            ],
        };
        let snapshot = clean_rate_payload(payload).unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].currency, "GBP/CNY");
    }

    #[test]
    fn test_missing_last_date_is_parse_error() {
        let payload = RawRatePayload::default();
        assert!(matches!(clean_rate_payload(payload), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_payload_without_records_array_is_parse_error() {
        let body = r#"{"data":{"lastDate":"2025-07-02 9:15"}}"#;
        assert!(matches!(parse_rate_payload(body), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_payload_with_no_usable_records_is_parse_error() {
        let empty = parse_rate_payload(r#"{"data":{"lastDate":"2025-07-02 9:15"},"records":[]}"#)
            .unwrap();
        assert!(matches!(clean_rate_payload(empty), Err(FetchError::Parse(_))));

        let all_bad = parse_rate_payload(
            r#"{"data":{"lastDate":"2025-07-02 9:15"},
                "records":[{"vrtCode":"USD/CNY","vrtEName":"USD/CNY","price":"--"}]}"#,
        )
        .unwrap();
        assert!(matches!(clean_rate_payload(all_bad), Err(FetchError::Parse(_))));
    }
}
