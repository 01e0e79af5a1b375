use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize;
use crate::error::{Result, TrackerError};

/// How a rule recognizes a canonical key.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    /// Anchored at both ends when compiled: the whole key must match.
    Pattern(Regex),
}

impl Matcher {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(Self::Pattern)
            .map_err(|e| TrackerError::Settings(format!("invalid rule pattern '{pattern}': {e}")))
    }

    pub fn matches(&self, canonical_key: &str) -> bool {
        match self {
            Self::Exact(key) => key == canonical_key,
            Self::Pattern(re) => re.is_match(canonical_key),
        }
    }

    pub fn describe(&self) -> (&'static str, &str) {
        match self {
            Self::Exact(key) => ("exact", key.as_str()),
            Self::Pattern(re) => ("pattern", re.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: Matcher,
    pub major_category: String,
    pub sub_category: String,
    pub display_name: Option<String>,
}

/// Rule as written in settings.json. Exactly one of `exact`/`pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub major_category: String,
    pub sub_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl RuleSpec {
    pub fn compile(&self) -> Result<Rule> {
        let matcher = match (&self.exact, &self.pattern) {
            (Some(exact), None) => Matcher::Exact(canonicalize(exact.as_str())),
            (None, Some(pattern)) => Matcher::pattern(pattern)?,
            _ => {
                return Err(TrackerError::Settings(format!(
                    "rule for '{}/{}' needs exactly one of 'exact' or 'pattern'",
                    self.major_category, self.sub_category
                )))
            }
        };
        Ok(Rule {
            matcher,
            major_category: self.major_category.clone(),
            sub_category: self.sub_category.clone(),
            display_name: self.display_name.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub major_category: String,
    pub sub_category: Option<String>,
    pub display_name: String,
    pub overridden: bool,
}

/// Immutable, ordered rule list. First match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

fn exact(name: &str, major: &str, sub: &str) -> Rule {
    Rule {
        matcher: Matcher::Exact(canonicalize(name)),
        major_category: major.to_string(),
        sub_category: sub.to_string(),
        display_name: Some(name.to_string()),
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Self {
        let ntt = Matcher::pattern(r"(?:\d+\s*)?NTT").expect("valid NTT rule pattern");
        let rules = vec![
            exact("SBI・V・S&P500インデックス・ファンド", "投資信託", "米国株"),
            exact("eMAXIS Slim 全世界株式", "投資信託", "全世界"),
            exact("iTrust インド株式", "投資信託", "インド"),
            exact("iFreeNEXT FANG+", "投資信託", "米国テック株"),
            Rule {
                matcher: ntt,
                major_category: "日本株".to_string(),
                sub_category: "個別株".to_string(),
                display_name: Some("NTT".to_string()),
            },
        ];
        Self { rules }
    }

    /// Configured rules first, then the built-in ones.
    pub fn with_configured(specs: &[RuleSpec]) -> Result<Self> {
        let mut rules = specs.iter().map(RuleSpec::compile).collect::<Result<Vec<_>>>()?;
        rules.extend(Self::builtin().rules);
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn classify(
        &self,
        canonical_key: &str,
        major_category: &str,
        sub_category: Option<&str>,
        name_or_ticker: &str,
    ) -> Classification {
        for rule in &self.rules {
            if rule.matcher.matches(canonical_key) {
                return Classification {
                    major_category: rule.major_category.clone(),
                    sub_category: Some(rule.sub_category.clone()),
                    display_name: rule
                        .display_name
                        .clone()
                        .unwrap_or_else(|| name_or_ticker.to_string()),
                    overridden: true,
                };
            }
        }
        Classification {
            major_category: major_category.to_string(),
            sub_category: sub_category.map(str::to_string),
            display_name: name_or_ticker.to_string(),
            overridden: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_rule_applies_to_canonical_key() {
        let rules = RuleSet::builtin();
        let key = canonicalize("iFreeNEXT FANG+");
        let c = rules.classify(&key, "投資信託", Some("その他"), "iFreeNEXT FANG+");
        assert_eq!(c.major_category, "投資信託");
        assert_eq!(c.sub_category.as_deref(), Some("米国テック株"));
        assert!(c.overridden);
    }

    #[test]
    fn test_fullwidth_variant_hits_same_rule() {
        let rules = RuleSet::builtin();
        let key = canonicalize("ＳＢＩ・Ｖ・Ｓ＆Ｐ５００インデックス・ファンド");
        let c = rules.classify(&key, "", None, "ＳＢＩ・Ｖ・Ｓ＆Ｐ５００インデックス・ファンド");
        assert_eq!(c.sub_category.as_deref(), Some("米国株"));
        assert_eq!(c.display_name, "SBI・V・S&P500インデックス・ファンド");
    }

    #[test]
    fn test_pattern_rule_full_match() {
        let rules = RuleSet::builtin();
        let c = rules.classify(&canonicalize("9432 ＮＴＴ"), "日本株", Some("株式"), "9432 ＮＴＴ");
        assert_eq!((c.major_category.as_str(), c.sub_category.as_deref()), ("日本株", Some("個別株")));
        assert_eq!(c.display_name, "NTT");

        let c = rules.classify(&canonicalize("NTTデータ"), "日本株", Some("株式"), "NTTデータ");
        assert!(!c.overridden);
    }

    #[test]
    fn test_no_match_passes_input_through() {
        let rules = RuleSet::builtin();
        let c = rules.classify("UNKNOWN FUND", "債券", None, "Unknown Fund");
        assert_eq!(
            c,
            Classification {
                major_category: "債券".into(),
                sub_category: None,
                display_name: "Unknown Fund".into(),
                overridden: false,
            }
        );
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new(vec![
            Rule {
                matcher: Matcher::pattern("AB.*").unwrap(),
                major_category: "first".into(),
                sub_category: "one".into(),
                display_name: None,
            },
            Rule {
                matcher: Matcher::Exact("ABC".into()),
                major_category: "second".into(),
                sub_category: "two".into(),
                display_name: Some("Second".into()),
            },
        ]);
        let c = rules.classify("ABC", "x", Some("y"), "abc");
        assert_eq!(c.major_category, "first");
        assert_eq!(c.sub_category.as_deref(), Some("one"));
        assert_eq!(c.display_name, "abc");
    }

    #[test]
    fn test_configured_rules_precede_builtin() {
        let specs = vec![RuleSpec {
            exact: Some("iFreeNEXT FANG+".into()),
            pattern: None,
            major_category: "テック".into(),
            sub_category: "FANG".into(),
            display_name: None,
        }];
        let rules = RuleSet::with_configured(&specs).unwrap();
        let c = rules.classify(&canonicalize("iFreeNEXT FANG+"), "", None, "fang");
        assert_eq!(c.major_category, "テック");
        assert_eq!(rules.rules().len(), RuleSet::builtin().rules().len() + 1);
    }

    #[test]
    fn test_rule_spec_needs_one_matcher() {
        let spec = RuleSpec {
            exact: Some("A".into()),
            pattern: Some("B".into()),
            major_category: "m".into(),
            sub_category: "s".into(),
            display_name: None,
        };
        assert!(matches!(spec.compile(), Err(TrackerError::Settings(_))));
        let bad = RuleSpec { exact: None, pattern: Some("(".into()), ..spec };
        assert!(matches!(bad.compile(), Err(TrackerError::Settings(_))));
    }

    #[test]
    fn test_builtin_includes_ntt_pattern_rule() {
        let rules = RuleSet::builtin();
        assert_eq!(rules.rules().len(), 5);
        let last = rules.rules().last().unwrap();
        assert!(matches!(last.matcher, Matcher::Pattern(_)));
        assert_eq!(last.display_name.as_deref(), Some("NTT"));
    }
}
