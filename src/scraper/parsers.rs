use super::FetchError;
use crate::models::{Metal, RawMetalBlock, RawPriceItem, RawRatePayload};
use scraper::{ElementRef, Html, Selector};

// ── Central parity JSON ───────────────────────────────────────────────────────

pub fn parse_rate_payload(body: &str) -> Result<RawRatePayload, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("rate payload is not valid JSON: {}", e)))
}

// ── SGE home page ─────────────────────────────────────────────────────────────

/// Block id per metal on the exchange's landing page.
const METAL_BLOCKS: [(Metal, &str); 2] = [
    (Metal::Gold, "div#dataStatistics0"),
    (Metal::Silver, "div#dataStatistics1"),
];

fn selector(s: &str) -> Result<Selector, FetchError> {
    Selector::parse(s).map_err(|e| FetchError::Parse(format!("selector {}: {:?}", s, e)))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract the gold and silver blocks. Both must be present with at least
/// three list items (date label, AM price, PM price).
pub fn parse_metal_page(html: &str) -> Result<Vec<RawMetalBlock>, FetchError> {
    let doc = Html::parse_document(html);

    let li_sel = selector("li")?;
    let p_sel = selector("p")?;
    let price_sel = selector("span.colorRed")?;

    let price_item = |li: ElementRef<'_>| RawPriceItem {
        description: li.select(&p_sel).next().map(element_text),
        price: li.select(&price_sel).next().map(element_text),
    };

    let mut blocks = Vec::with_capacity(METAL_BLOCKS.len());

    for (metal, block_sel) in METAL_BLOCKS {
        let sel = selector(block_sel)?;
        let block = doc
            .select(&sel)
            .next()
            .ok_or_else(|| FetchError::Parse(format!("{} data block not found", metal)))?;

        let items: Vec<ElementRef<'_>> = block.select(&li_sel).collect();
        if items.len() < 3 {
            return Err(FetchError::Parse(format!(
                "{} data block has {} items, expected at least 3",
                metal,
                items.len()
            )));
        }

        blocks.push(RawMetalBlock {
            metal,
            date_label: element_text(items[0]),
            am: price_item(items[1]),
            pm: price_item(items[2]),
        });
    }

    Ok(blocks)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_metal_page_blocks() {
        let blocks = parse_metal_page(SGE_PAGE).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].metal, Metal::Gold);
        assert_eq!(blocks[0].date_label, "行情日期：2025-07-01");
        assert_eq!(blocks[0].am.price.as_deref(), Some("770.51"));
        assert_eq!(blocks[0].pm.description.as_deref(), Some("上海金午盘价（元/克）"));
        assert_eq!(blocks[1].metal, Metal::Silver);
        assert_eq!(blocks[1].pm.price.as_deref(), Some("8822"));
    }

    #[test]
    fn test_short_block_is_a_parse_error() {
        let err = parse_metal_page(SGE_PAGE_SHORT_SILVER).unwrap_err();
        assert!(matches!(err, FetchError::Parse(ref m) if m.contains("Silver")));
    }

    #[test]
    fn test_missing_block_is_a_parse_error() {
        let err = parse_metal_page("<html><body><p>maintenance</p></body></html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse(ref m) if m.contains("Gold")));
    }

    #[test]
    fn test_parse_rate_payload() {
        let payload = parse_rate_payload(RATE_JSON).unwrap();
        assert_eq!(
            payload.data.and_then(|d| d.last_date).as_deref(),
            Some("2025-07-01 9:15")
        );
        assert_eq!(payload.records.len(), 3);
        assert_eq!(payload.records[1].name.as_deref(), Some("EUR/CNY"));
    }

    #[test]
    fn test_rate_payload_garbage() {
        assert!(matches!(
            parse_rate_payload("<html>blocked</html>"),
            Err(FetchError::Parse(_))
        ));
    }
}
