use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use tracing::{debug, info};

use crate::accounts::{normalize_label, report_account_type};
use crate::error::{Result, TrackerError};
use crate::models::ParsedRow;
use crate::numbers::{is_blank, parse_quantity, parse_value_jpy};

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Candidate encodings in the order they are tried. encoding_rs folds
/// cp932 and shift_jis into one decoder (the WHATWG Shift_JIS), so the
/// alias appears once.
fn encoding_candidates() -> [&'static Encoding; 2] {
    [SHIFT_JIS, UTF_8]
}

fn decode_strict(data: &[u8], encoding: &'static Encoding) -> Option<String> {
    let data = if encoding == UTF_8 {
        data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
    } else {
        data
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

const REPORT_TITLE: &str = "保有証券一覧";
const STOCK_SECTION: &str = "株式(";
const FUND_SECTION: &str = "投資信託(";
const FUND_SECTION_AMOUNT: &str = "投資信託(金額/";
const AMOUNT_PREFIX: &str = "金額/";
const NISA_MARKER: &str = "NISA";

fn looks_like_report(text: &str) -> bool {
    if text.contains(REPORT_TITLE) {
        return true;
    }
    let normalized = normalize_label(text);
    normalized.contains(STOCK_SECTION) || normalized.contains(FUND_SECTION_AMOUNT)
}

/// Returns whether the bytes are a holdings report, together with the text
/// they decoded to. Non-report input decodes with the first working
/// candidate and is not an error.
pub fn detect_report_csv(data: &[u8]) -> Result<(bool, String)> {
    let mut first_decoded: Option<String> = None;
    for encoding in encoding_candidates() {
        let Some(text) = decode_strict(data, encoding) else {
            continue;
        };
        if looks_like_report(&text) {
            debug!(encoding = encoding.name(), "detected holdings report");
            return Ok((true, text));
        }
        first_decoded.get_or_insert(text);
    }
    first_decoded.map(|text| (false, text)).ok_or_else(|| {
        TrackerError::Format("could not determine the CSV text encoding".to_string())
    })
}

// ---------------------------------------------------------------------------
// Import formats: enum dispatch instead of trait objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// Multi-section brokerage holdings report.
    Report,
    /// Flat table with a header row.
    Flat,
}

impl ImportFormat {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Flat => "flat",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        [Self::Report, Self::Flat].into_iter().find(|f| f.key() == key)
    }

    /// Detect the format, returning the decoded text alongside.
    pub fn detect(data: &[u8]) -> Result<(Self, String)> {
        let (is_report, text) = detect_report_csv(data)?;
        let format = if is_report { Self::Report } else { Self::Flat };
        info!(format = format.key(), "detected import format");
        Ok((format, text))
    }
}

// ---------------------------------------------------------------------------
// Report parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetType {
    Stock,
    Fund,
}

impl AssetType {
    fn categories(&self) -> (&'static str, &'static str) {
        match self {
            Self::Stock => ("日本株", "株式"),
            Self::Fund => ("投資信託", "投資信託"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Columns {
    Stock {
        code: usize,
        name: usize,
        shares: usize,
        value: usize,
    },
    Fund {
        name: usize,
        units: usize,
        value: usize,
    },
}

struct Section {
    asset: AssetType,
    account: Option<String>,
    qualifies: bool,
    columns: Option<Columns>,
}

fn first_non_blank(row: &csv::StringRecord) -> Option<&str> {
    row.iter().map(str::trim).find(|c| !c.is_empty())
}

fn extract_account_label(section_text: &str) -> Option<String> {
    let (_, rest) = section_text.split_once('(')?;
    let (inner, _) = rest.rsplit_once(')')?;
    let inner = inner.strip_prefix(AMOUNT_PREFIX).unwrap_or(inner);
    (!inner.is_empty()).then(|| inner.to_string())
}

fn parse_section_header(row: &csv::StringRecord) -> Option<(AssetType, Option<String>)> {
    let normalized = normalize_label(first_non_blank(row)?);
    let asset = if normalized.starts_with(STOCK_SECTION) {
        AssetType::Stock
    } else if normalized.starts_with(FUND_SECTION) {
        AssetType::Fund
    } else {
        return None;
    };
    Some((asset, extract_account_label(&normalized)))
}

fn parse_header_row(row: &csv::StringRecord, asset: AssetType) -> Option<Columns> {
    let headers: Vec<String> = row.iter().map(normalize_label).collect();
    let find = |name: &str| headers.iter().position(|h| h == name);
    match asset {
        AssetType::Stock => Some(Columns::Stock {
            code: find("銘柄コード")?,
            name: find("銘柄名称")?,
            shares: find("保有株数")?,
            value: find("評価額")?,
        }),
        AssetType::Fund => Some(Columns::Fund {
            name: find("ファンド名")?,
            units: find("保有口数")?,
            value: find("評価額")?,
        }),
    }
}

fn get_cell(row: &csv::StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("")
}

/// Parse a holdings report. Fails if the input is not report-shaped.
pub fn parse_report_csv(data: &[u8]) -> Result<Vec<ParsedRow>> {
    let (is_report, text) = detect_report_csv(data)?;
    parse_detected_report(is_report, &text)
}

/// Parse text already run through [`detect_report_csv`], refusing text that
/// detection did not accept as a report.
pub fn parse_detected_report(is_report: bool, text: &str) -> Result<Vec<ParsedRow>> {
    if !is_report {
        return Err(TrackerError::Format(
            "not a holdings report CSV".to_string(),
        ));
    }
    parse_report_text(text)
}

pub fn parse_report_text(text: &str) -> Result<Vec<ParsedRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    let mut section: Option<Section> = None;

    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|c| is_blank(Some(c))) {
            continue;
        }

        if let Some((asset, account)) = parse_section_header(&record) {
            let qualifies = match asset {
                AssetType::Stock => true,
                AssetType::Fund => account.as_deref().is_some_and(|a| a.contains(NISA_MARKER)),
            };
            debug!(?asset, account = account.as_deref(), qualifies, "report section");
            section = Some(Section {
                asset,
                account,
                qualifies,
                columns: None,
            });
            continue;
        }

        let Some(current) = section.as_mut() else {
            continue;
        };

        let columns = match current.columns {
            Some(columns) => columns,
            None => {
                current.columns = parse_header_row(&record, current.asset);
                continue;
            }
        };
        if !current.qualifies {
            continue;
        }

        let (name_or_ticker, quantity, value_text) = match columns {
            Columns::Stock {
                code,
                name,
                shares,
                value,
            } => {
                let code = get_cell(&record, code).trim();
                let name = get_cell(&record, name).trim();
                let name_or_ticker = format!("{code} {name}").trim().to_string();
                let quantity = parse_quantity(Some(get_cell(&record, shares))).ok().flatten();
                (name_or_ticker, quantity, get_cell(&record, value))
            }
            Columns::Fund { name, units, value } => {
                let name = get_cell(&record, name).trim().to_string();
                let units = get_cell(&record, units).replace('口', "");
                let quantity = parse_quantity(Some(units.as_str())).ok().flatten();
                (name, quantity, get_cell(&record, value))
            }
        };

        let Some(value_jpy) = parse_value_jpy(Some(value_text))? else {
            continue;
        };
        if name_or_ticker.is_empty() {
            continue;
        }

        let (major, sub) = current.asset.categories();
        rows.push(ParsedRow {
            major_category: major.to_string(),
            sub_category: sub.to_string(),
            name_or_ticker,
            account_type: report_account_type(current.account.as_deref()),
            quantity,
            value_jpy,
        });
    }

    info!(rows = rows.len(), "parsed holdings report");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = concat!(
        "保有証券一覧\n",
        "株式（NISA預り（成長投資枠））\n",
        "銘柄コード,銘柄名称,保有株数,評価額\n",
        "9432,ＮＴＴ,\"1,234\",\"601,652\"\n",
        "投資信託（金額/NISA預り（成長投資枠））\n",
        "ファンド名,保有口数,評価額\n",
        "ｅＭＡＸＩＳ　Ｓｌｉｍ　全世界株式（オール・カントリー）,214760口,\"1,000\"\n",
        "投資信託（金額/NISA預り（つみたて投資枠））\n",
        "ファンド名,保有口数,評価額\n",
        "ｅＭＡＸＩＳ　Ｓｌｉｍ　全世界株式（除く日本）,\"211,866口\",\"2,000\"\n",
        "投資信託（金額/旧つみたてNISA預り）\n",
        "ファンド名,保有口数,評価額\n",
        "旧つみたてファンド,10口,\"3,000\"\n",
    );

    #[test]
    fn test_parse_report_extracts_nisa_sections() {
        let rows = parse_report_csv(REPORT.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        let accounts: Vec<&str> = rows.iter().map(|r| r.account_type.as_str()).collect();
        assert_eq!(accounts, ["NISA(成長)", "NISA(成長)", "NISA(つみたて)", "旧つみたてNISA"]);
        assert_eq!(rows[0].name_or_ticker, "9432 ＮＴＴ");
        assert_eq!(rows[0].quantity, Some(1234.0));
        assert_eq!(rows[0].value_jpy, 601652);
        assert_eq!((rows[0].major_category.as_str(), rows[0].sub_category.as_str()), ("日本株", "株式"));
        assert_eq!(rows[1].quantity, Some(214760.0));
        assert_eq!(rows[1].major_category, "投資信託");
        assert_eq!(rows[2].quantity, Some(211866.0));
        assert_eq!(rows[3].value_jpy, 3000);
    }

    #[test]
    fn test_taxable_fund_section_is_dropped() {
        let text = concat!(
            "株式（特定預り）\n",
            "銘柄コード,銘柄名称,保有株数,評価額\n",
            "7203,トヨタ自動車,100,\"300,000\"\n",
            "投資信託（金額/特定預り）\n",
            "ファンド名,保有口数,評価額\n",
            "課税ファンド,10口,\"5,000\"\n",
            "投資信託（金額/NISA預り（つみたて投資枠））\n",
            "ファンド名,保有口数,評価額\n",
            "つみたてファンド,\"1,000口\",\"6,000\"\n",
        );
        let rows = parse_report_text(text).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name_or_ticker.as_str()).collect();
        assert_eq!(names, ["7203 トヨタ自動車", "つみたてファンド"]);
        assert_eq!(rows[0].account_type, "特定預り");
        assert_eq!(rows[1].quantity, Some(1000.0));
    }

    #[test]
    fn test_placeholder_rows_are_skipped() {
        let text = concat!(
            "株式（NISA預り（成長投資枠））\n",
            "銘柄コード,銘柄名称,保有株数,評価額\n",
            "9432,ＮＴＴ,100,-\n",
            ",,100,\"1,000\"\n",
            ",,,\n",
            "8306,三菱ＵＦＪ,200,\"400,000\"\n",
        );
        let rows = parse_report_text(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name_or_ticker, "8306 三菱ＵＦＪ");
    }

    #[test]
    fn test_rows_before_header_are_ignored() {
        let text = concat!(
            "株式（NISA預り（成長投資枠））\n",
            "合計,\"1,000\"\n",
            "銘柄コード,銘柄名称,保有株数,評価額\n",
            "9432,ＮＴＴ,100,\"1,000\"\n",
        );
        let rows = parse_report_text(text).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_header_columns_found_by_name() {
        let text = concat!(
            "株式（NISA預り（成長投資枠））\n",
            "評価額,保有株数,銘柄名称,銘柄コード,取得単価\n",
            "\"5,000\",10,ＮＴＴ,9432,150\n",
        );
        let rows = parse_report_text(text).unwrap();
        assert_eq!(rows[0].name_or_ticker, "9432 ＮＴＴ");
        assert_eq!(rows[0].value_jpy, 5000);
        assert_eq!(rows[0].quantity, Some(10.0));
    }

    #[test]
    fn test_negative_valuation_is_surfaced() {
        let text = concat!(
            "株式（NISA預り（成長投資枠））\n",
            "銘柄コード,銘柄名称,保有株数,評価額\n",
            "9432,ＮＴＴ,100,-5\n",
        );
        assert!(matches!(parse_report_text(text), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn test_shift_jis_report_decodes() {
        let (bytes, _, had_errors) = SHIFT_JIS.encode(REPORT);
        assert!(!had_errors);
        let (is_report, text) = detect_report_csv(&bytes).unwrap();
        assert!(is_report);
        assert!(text.contains("保有証券一覧"));
        assert_eq!(parse_report_csv(&bytes).unwrap().len(), 4);
    }

    #[test]
    fn test_detect_without_title_uses_section_tokens() {
        let text = "投資信託 ( 金額/NISA預り )\nファンド名,保有口数,評価額\n";
        assert!(detect_report_csv(text.as_bytes()).unwrap().0);
    }

    #[test]
    fn test_flat_csv_is_not_a_report() {
        let text = "name_or_ticker,value_jpy\nAAPL,\"1,000\"\n";
        let (is_report, decoded) = detect_report_csv(text.as_bytes()).unwrap();
        assert!(!is_report);
        assert_eq!(decoded, text);
        assert!(matches!(parse_report_csv(text.as_bytes()), Err(TrackerError::Format(_))));
        assert_eq!(ImportFormat::detect(text.as_bytes()).unwrap().0, ImportFormat::Flat);
    }

    #[test]
    fn test_undecodable_bytes_fail() {
        let data = [0x82, 0xFF, 0xFE, 0x80];
        assert!(matches!(detect_report_csv(&data), Err(TrackerError::Format(_))));
    }

    #[test]
    fn test_format_keys() {
        assert_eq!(ImportFormat::from_key("report"), Some(ImportFormat::Report));
        assert_eq!(ImportFormat::from_key("flat"), Some(ImportFormat::Flat));
        assert_eq!(ImportFormat::from_key("xlsx"), None);
    }
}
