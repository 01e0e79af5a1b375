use crate::error::{Result, TrackerError};

/// Blank means missing: empty, whitespace, or a lone hyphen placeholder.
pub fn is_blank(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(s) => matches!(s.trim(), "" | "-"),
    }
}

fn clean_number(raw: Option<&str>) -> Option<String> {
    if is_blank(raw) {
        return None;
    }
    let cleaned: String = raw?.replace(',', "").trim().to_string();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    Some(cleaned)
}

/// Parse a yen valuation: thousands separators allowed, never negative.
pub fn parse_value_jpy(raw: Option<&str>) -> Result<Option<i64>> {
    let Some(cleaned) = clean_number(raw) else {
        return Ok(None);
    };
    let value: i64 = cleaned
        .parse()
        .map_err(|_| TrackerError::InvalidNumber(cleaned.clone()))?;
    if value < 0 {
        return Err(TrackerError::Validation(
            "value_jpy must be 0 or greater".to_string(),
        ));
    }
    Ok(Some(value))
}

/// Parse a unit count. Unlike valuations, negative values pass through.
pub fn parse_quantity(raw: Option<&str>) -> Result<Option<f64>> {
    parse_float(raw)
}

pub fn parse_float(raw: Option<&str>) -> Result<Option<f64>> {
    let Some(cleaned) = clean_number(raw) else {
        return Ok(None);
    };
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(TrackerError::InvalidNumber(cleaned)),
    }
}
