//! Price normalization and currency attribution.
//!
//! A price candidate is accepted when it contains a decimal number with
//! optional comma thousands separators. The currency marker is stripped, the
//! separators removed, the decimal point kept verbatim, and a prefix is
//! reattached:
//!
//! 1. the site family's `currency_prefix`, when configured;
//! 2. otherwise the prefix mapped from a currency token found in the text;
//! 3. otherwise the table's default prefix.

use std::fmt;

use crate::rules::{RuleTable, SiteFamily};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPrice {
    pub prefix: String,
    /// Digits and an optional decimal point, never thousands separators.
    pub amount: String,
    pub value: f64,
}

impl fmt::Display for NormalizedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.amount)
    }
}

/// Normalize the first currency-marked amount in `text`, or the first bare
/// number when no currency token is present. Percentages, quantities and
/// ratings ahead of the amount are skipped that way.
pub fn normalize_price(
    text: &str,
    family: Option<&SiteFamily>,
    rules: &RuleTable,
) -> Option<NormalizedPrice> {
    let (caps, marked) = match rules.currency_amount_pattern().captures(text) {
        Some(caps) => (caps, true),
        None => (rules.number_pattern().captures(text)?, false),
    };
    // Attribute the currency from the matched amount, not from stray
    // tokens elsewhere in the text.
    let marker = if marked {
        caps.get(0).map_or(text, |m| m.as_str())
    } else {
        text
    };
    let integer = caps.get(1)?.as_str().replace(',', "");
    let amount = match caps.get(2) {
        Some(fraction) => format!("{integer}.{}", fraction.as_str()),
        None => integer,
    };
    let value = amount.parse::<f64>().ok().filter(|v| v.is_finite())?;

    let prefix = family
        .and_then(|f| f.currency_prefix.as_deref())
        .or_else(|| rules.detect_currency(marker))
        .unwrap_or_else(|| rules.default_currency_prefix())
        .to_string();

    Some(NormalizedPrice {
        prefix,
        amount,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daraz(rules: &RuleTable) -> &SiteFamily {
        rules.families().iter().find(|f| f.name == "daraz").unwrap()
    }

    #[test]
    fn test_normalize_dollar() {
        let rules = RuleTable::builtin().unwrap();
        let p = normalize_price("$19.99", None, &rules).unwrap();
        assert_eq!(p.to_string(), "$19.99");
        assert!((p.value - 19.99).abs() < 1e-9);

        assert_eq!(
            normalize_price("US $1,234.56", None, &rules).unwrap().to_string(),
            "$1234.56"
        );
        assert_eq!(
            normalize_price("1,000,000", None, &rules).unwrap().amount,
            "1000000"
        );
    }

    #[test]
    fn test_family_prefix_is_consistent() {
        let rules = RuleTable::builtin().unwrap();
        let family = daraz(&rules);
        let a = normalize_price("Rs. 1,250.50", Some(family), &rules).unwrap();
        let b = normalize_price("1250.50", Some(family), &rules).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Rs. 1250.50");
    }

    #[test]
    fn test_detected_token_without_family() {
        let rules = RuleTable::builtin().unwrap();
        assert_eq!(
            normalize_price("Rs. 1,250.50", None, &rules).unwrap().to_string(),
            "Rs. 1250.50"
        );
        assert_eq!(
            normalize_price("€ 45", None, &rules).unwrap().to_string(),
            "€45"
        );
        // No marker at all falls back to the default prefix.
        assert_eq!(
            normalize_price("1250.50", None, &rules).unwrap().to_string(),
            "$1250.50"
        );
    }

    #[test]
    fn test_decimal_digits_are_preserved() {
        let rules = RuleTable::builtin().unwrap();
        assert_eq!(normalize_price("$5.50", None, &rules).unwrap().amount, "5.50");
        assert_eq!(normalize_price("$5.5", None, &rules).unwrap().amount, "5.5");
    }

    #[test]
    fn test_ranges_take_first_amount() {
        let rules = RuleTable::builtin().unwrap();
        assert_eq!(
            normalize_price("US $3.10 - 5.80", None, &rules).unwrap().to_string(),
            "$3.10"
        );
    }

    #[test]
    fn test_currency_amount_wins_over_leading_numbers() {
        let rules = RuleTable::builtin().unwrap();
        for (text, expected) in [
            ("Save 20% now US $19.99", "$19.99"),
            ("Qty 2 x $4.50", "$4.50"),
            ("4.8 stars (1,203 reviews) Rs. 2,499", "Rs. 2499"),
            ("-15% € 42.00", "€42.00"),
        ] {
            assert_eq!(
                normalize_price(text, None, &rules).unwrap().to_string(),
                expected,
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_rejects_text_without_numbers() {
        let rules = RuleTable::builtin().unwrap();
        assert!(normalize_price("Price on request", None, &rules).is_none());
        assert!(normalize_price("", None, &rules).is_none());
    }
}
