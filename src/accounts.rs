//! Account-type label normalization.

/// Verbose tax-account labels printed in report section headers.
const REPORT_ACCOUNT_ALIASES: &[(&str, &str)] = &[
    ("NISA預り(成長投資枠)", "NISA(成長)"),
    ("NISA預り(つみたて投資枠)", "NISA(つみたて)"),
    ("旧つみたてNISA預り", "旧つみたてNISA"),
];

/// Free-text synonyms accepted from flat tables and vision rows. Checked in
/// order, so the more specific labels come first.
const ACCOUNT_SYNONYMS: &[(&str, &str)] = &[
    ("旧つみたてNISA", "旧つみたてNISA"),
    ("NISA(成長)", "NISA(成長)"),
    ("成長投資枠", "NISA(成長)"),
    ("NISA(つみたて)", "NISA(つみたて)"),
    ("つみたて投資枠", "NISA(つみたて)"),
    ("特定預り", "特定"),
    ("特定口座", "特定"),
    ("一般預り", "一般"),
    ("一般口座", "一般"),
];

/// Strip all whitespace and turn full-width parentheses into ASCII ones.
pub fn normalize_label(text: &str) -> String {
    text.replace('（', "(")
        .replace('）', ")")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn lookup(table: &[(&str, &'static str)], text: &str) -> Option<&'static str> {
    let normalized = normalize_label(text);
    table
        .iter()
        .find(|(key, _)| normalized.contains(key))
        .map(|(_, short)| *short)
}

/// Map a report section's account label to its short form, or pass it
/// through trimmed.
pub fn report_account_type(label: Option<&str>) -> String {
    let Some(label) = label.filter(|l| !l.trim().is_empty()) else {
        return String::new();
    };
    lookup(REPORT_ACCOUNT_ALIASES, label)
        .map(str::to_string)
        .unwrap_or_else(|| label.trim().to_string())
}

/// Map a free-text account type through the synonym table. `None` when
/// nothing matches; callers fall back to the trimmed text.
pub fn normalize_account_type(text: Option<&str>) -> Option<String> {
    let text = text.filter(|t| !t.trim().is_empty())?;
    lookup(REPORT_ACCOUNT_ALIASES, text)
        .or_else(|| lookup(ACCOUNT_SYNONYMS, text))
        .map(str::to_string)
}
