//! Rows returned by an external screenshot/OCR collaborator.
//!
//! The collaborator answers with a JSON array of position objects, sometimes
//! wrapped in prose. Each object is mapped onto a [`RawRow`] so it goes
//! through the same row builder as CSV imports.

use serde_json::Value;

use crate::accounts::normalize_account_type;
use crate::error::{Result, RowError, TrackerError};
use crate::models::RawRow;
use crate::numbers::{parse_float, parse_quantity};

const MAJOR_CATEGORY: &str = "米国株";
const SUB_CATEGORY: &str = "個別株";
const UNKNOWN_ACCOUNT: &str = "不明";

/// Pull the JSON array out of a collaborator reply.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>> {
    let payload: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
                return Err(TrackerError::Format("no JSON array in response".to_string()));
            };
            if end <= start {
                return Err(TrackerError::Format("no JSON array in response".to_string()));
            }
            serde_json::from_str(&text[start..=end])?
        }
    };
    match payload {
        Value::Array(items) => Ok(items),
        _ => Err(TrackerError::Format("response is not a JSON array".to_string())),
    }
}

fn field_text(row: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A normalized vision row. `avg_cost` and `last_price` are informational.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRow {
    pub ticker: String,
    pub name: Option<String>,
    pub avg_cost: Option<f64>,
    pub last_price: Option<f64>,
    pub raw: RawRow,
}

fn normalize_row(row: &serde_json::Map<String, Value>, row_no: usize) -> std::result::Result<VisionRow, RowError> {
    let ticker = field_text(row, "ticker")
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RowError::new(row_no, "ticker not found"))?;
    let name = field_text(row, "name")
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let account = field_text(row, "account_type");
    let account_type = normalize_account_type(account.as_deref())
        .or_else(|| account.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()))
        .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string());

    let quantity = field_text(row, "quantity");
    if let Err(e) = parse_quantity(quantity.as_deref()) {
        return Err(RowError::new(row_no, format!("quantity: {e}")));
    }
    let number = |key: &str| -> std::result::Result<Option<f64>, RowError> {
        parse_float(field_text(row, key).as_deref()).map_err(|e| RowError::new(row_no, format!("{key}: {e}")))
    };
    let avg_cost = number("avg_cost")?;
    let last_price = number("last_price")?;

    let name_or_ticker = match &name {
        Some(name) => format!("{ticker} {name}"),
        None => ticker.clone(),
    };

    Ok(VisionRow {
        raw: RawRow {
            major_category: Some(MAJOR_CATEGORY.to_string()),
            sub_category: Some(SUB_CATEGORY.to_string()),
            name_or_ticker: Some(name_or_ticker),
            account_type: Some(account_type),
            quantity,
            value_jpy: field_text(row, "value_jpy"),
        },
        ticker,
        name,
        avg_cost,
        last_price,
    })
}

/// Parse a collaborator reply into vision rows plus per-row errors.
/// A payload that is not an array of objects is a format error.
pub fn parse_vision_payload(text: &str) -> Result<(Vec<VisionRow>, Vec<RowError>)> {
    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (idx, item) in extract_json_array(text)?.iter().enumerate() {
        let Value::Object(obj) = item else {
            return Err(TrackerError::Format(format!("row {}: not a JSON object", idx + 1)));
        };
        match normalize_row(obj, idx + 1) {
            Ok(row) => rows.push(row),
            Err(e) => errors.push(e),
        }
    }
    Ok((rows, errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_rows;
    use crate::categorizer::RuleSet;

    #[test]
    fn test_extracts_array_from_prose() {
        let text = "Here you go:\n```json\n[{\"ticker\": \"TSLA\"}]\n```";
        assert_eq!(extract_json_array(text).unwrap().len(), 1);
        assert!(matches!(extract_json_array("{\"a\": 1}"), Err(TrackerError::Format(_))));
        assert!(matches!(extract_json_array("nothing here"), Err(TrackerError::Format(_))));
    }

    #[test]
    fn test_rows_flow_through_builder() {
        let text = r#"[
            {"ticker": "tsla", "name": "テスラ", "quantity": 2, "avg_cost": 261.24,
             "last_price": "419.25", "value_jpy": "132,675", "account_type": "NISA(成長)"},
            {"ticker": "", "name": "no ticker", "value_jpy": 1},
            {"ticker": "AAPL", "quantity": "-", "value_jpy": null}
        ]"#;
        let (rows, errors) = parse_vision_payload(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(errors, vec![RowError::new(2, "ticker not found")]);

        let tsla = &rows[0];
        assert_eq!(tsla.ticker, "TSLA");
        assert_eq!(tsla.avg_cost, Some(261.24));
        assert_eq!(tsla.last_price, Some(419.25));
        assert_eq!(tsla.raw.name_or_ticker.as_deref(), Some("TSLA テスラ"));
        assert_eq!(rows[1].raw.account_type.as_deref(), Some("不明"));

        let raw: Vec<RawRow> = rows.into_iter().map(|r| r.raw).collect();
        let (built, build_errors) = build_rows(&raw, &RuleSet::builtin());
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].value_jpy, 132675);
        assert_eq!(built[0].quantity, Some(2.0));
        assert_eq!(built[0].major_category, "米国株");
        assert_eq!(built[0].canonical_key, "TSLA テスラ");
        assert_eq!(build_errors[0].message, "valuation is required");
    }

    #[test]
    fn test_non_object_element_is_format_error() {
        assert!(matches!(parse_vision_payload("[1, 2]"), Err(TrackerError::Format(_))));
    }
}
