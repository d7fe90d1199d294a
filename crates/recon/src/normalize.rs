//! Pure comparison helpers shared by the passes and the classifier.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Canonical form of a document number for equality checks.
///
/// Lower-cases, drops every character that is not a letter or digit, then
/// strips leading zeros from each remaining digit run (`INV-0042` and
/// `inv42` agree). An all-zero run keeps a single `0`. Letters are never
/// touched.
///
/// Digit runs are ASCII only. Other Unicode numerals (`٠١٢`, `²`) survive
/// the filter but are carried verbatim like letters, so `INV-٠٠٤٢` and
/// `INV-0042` stay distinct and no zeros are stripped from them.
pub fn normalize_doc_number(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    let mut significant = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_digit() {
            if !in_run {
                in_run = true;
                significant = false;
            }
            if c == '0' && !significant {
                continue;
            }
            significant = true;
            out.push(c);
        } else if c.is_alphanumeric() {
            if in_run && !significant {
                out.push('0');
            }
            in_run = false;
            out.push(c);
        }
    }
    if in_run && !significant {
        out.push('0');
    }

    out
}

/// Family key used by group matching.
///
/// A trailing suffix token of one or two characters (`-A`, `/2`, `.01`) is
/// dropped when what precedes it still carries an ASCII digit, so `INV-100-A`,
/// `INV-100/2` and `inv100` share family `inv100`. Everything else is its
/// own family.
pub fn doc_family(raw: &str) -> String {
    let tokens: Vec<&str> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if let Some((last, head)) = tokens.split_last() {
        let head_has_digit = head.iter().any(|t| t.chars().any(|c| c.is_ascii_digit()));
        if !head.is_empty() && last.chars().count() <= 2 && head_has_digit {
            return normalize_doc_number(&head.concat());
        }
    }
    normalize_doc_number(raw)
}

/// Minor-unit precision of an ISO-4217 currency code.
pub fn minor_units(currency: &str) -> u32 {
    match currency {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "XAF" | "XOF" => 0,
        "BHD" | "JOD" | "KWD" | "OMR" | "TND" | "IQD" | "LYD" => 3,
        _ => 2,
    }
}

/// Exact equality after rounding both sides to `scale` decimal places.
pub fn amounts_exact(a: Decimal, b: Decimal, scale: u32) -> bool {
    round_minor(a, scale) == round_minor(b, scale)
}

/// Scale used when comparing amounts in two (possibly different) currencies.
pub fn comparison_scale(currency_a: &str, currency_b: &str) -> u32 {
    minor_units(currency_a).min(minor_units(currency_b))
}

fn round_minor(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Either bound admits the pair: `|a-b| <= abs_tol`, or `|a-b|` strictly
/// below `pct_tol` of the smaller magnitude. A difference that overflows is
/// never within tolerance.
pub fn amounts_within_tolerance(a: Decimal, b: Decimal, abs_tol: Decimal, pct_tol: Decimal) -> bool {
    let Some(delta) = a.checked_sub(b).map(|d| d.abs()) else {
        return false;
    };
    if delta <= abs_tol {
        return true;
    }
    let base = a.abs().min(b.abs());
    pct_tol.checked_mul(base).is_some_and(|limit| delta < limit)
}

/// Absolute day difference within `days`. Absent dates never agree.
pub fn dates_within(a: Option<NaiveDate>, b: Option<NaiveDate>, days: i64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).num_days().abs() <= days,
        _ => false,
    }
}

/// Signed day offset `a - b` when both dates are present.
pub fn date_offset(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a - b).num_days()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(s: &str) -> Option<NaiveDate> {
        Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn normalize_case_and_separators() {
        assert_eq!(normalize_doc_number("INV-001"), "inv1");
        assert_eq!(normalize_doc_number("inv001"), "inv1");
        assert_eq!(normalize_doc_number(" Inv / 0001 "), "inv1");
        assert_eq!(normalize_doc_number("INV-001"), normalize_doc_number("inv.1"));
    }

    #[test]
    fn normalize_strips_zeros_per_digit_run() {
        assert_eq!(normalize_doc_number("00123"), "123");
        assert_eq!(normalize_doc_number("2024-0005"), "20240005");
        assert_eq!(normalize_doc_number("A0B007"), "a0b7");
        assert_eq!(normalize_doc_number("100"), "100");
    }

    #[test]
    fn normalize_keeps_single_zero_for_zero_run() {
        assert_eq!(normalize_doc_number("000"), "0");
        assert_eq!(normalize_doc_number("INV-000-A"), "inv0a");
    }

    #[test]
    fn normalize_leaves_letters_alone() {
        assert_eq!(normalize_doc_number("OO-Credit"), "oocredit");
    }

    #[test]
    fn normalize_treats_non_ascii_numerals_as_letters() {
        assert_eq!(normalize_doc_number("INV-\u{660}\u{660}42"), "inv\u{660}\u{660}42");
        assert_eq!(normalize_doc_number("\u{660}042"), "\u{660}42");
        assert_ne!(normalize_doc_number("INV-\u{660}42"), normalize_doc_number("INV-042"));
        // no ASCII digit ahead of the suffix, so it is kept
        assert_eq!(doc_family("INV-\u{661}-A"), "inv\u{661}a");
    }

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize_doc_number(""), "");
        assert_eq!(normalize_doc_number(" -/ "), "");
    }

    #[test]
    fn family_drops_short_suffix() {
        assert_eq!(doc_family("INV-100-A"), "inv100");
        assert_eq!(doc_family("INV-100/2"), "inv100");
        assert_eq!(doc_family("inv100"), "inv100");
        assert_eq!(doc_family("INV100-B"), "inv100");
        assert_eq!(doc_family("INV-0100-12"), "inv100");
    }

    #[test]
    fn family_keeps_whole_number_otherwise() {
        assert_eq!(doc_family("2024-0005"), "20240005");
        assert_eq!(doc_family("A-1"), "a1");
        assert_eq!(doc_family("CREDIT"), "credit");
        assert_eq!(doc_family(""), "");
    }

    #[test]
    fn exact_rounds_to_minor_units() {
        assert!(amounts_exact(dec("1000.00"), dec("1000"), 2));
        assert!(amounts_exact(dec("10.004"), dec("10.00"), 2));
        assert!(!amounts_exact(dec("10.005"), dec("10.00"), 2));
        assert!(amounts_exact(dec("1500.4"), dec("1500"), 0));
    }

    #[test]
    fn comparison_scale_takes_lesser_precision() {
        assert_eq!(comparison_scale("USD", "USD"), 2);
        assert_eq!(comparison_scale("USD", "JPY"), 0);
        assert_eq!(comparison_scale("KWD", "EUR"), 2);
        assert_eq!(comparison_scale("KWD", "BHD"), 3);
    }

    #[test]
    fn tolerance_absolute_is_inclusive() {
        assert!(amounts_within_tolerance(dec("1001.00"), dec("1000.00"), dec("1.00"), dec("0")));
        assert!(!amounts_within_tolerance(dec("1001.01"), dec("1000.00"), dec("1.00"), dec("0")));
    }

    #[test]
    fn tolerance_relative_is_strict_against_smaller_side() {
        // 0.5% of 1000 is exactly 5.00: not admitted.
        assert!(!amounts_within_tolerance(dec("1005.00"), dec("1000.00"), dec("1.00"), dec("0.005")));
        assert!(amounts_within_tolerance(dec("1004.99"), dec("1000.00"), dec("1.00"), dec("0.005")));
        assert!(amounts_within_tolerance(dec("100400"), dec("100000"), dec("1.00"), dec("0.005")));
    }

    #[test]
    fn tolerance_handles_negative_amounts() {
        assert!(amounts_within_tolerance(dec("-250.50"), dec("-250.00"), dec("1.00"), dec("0")));
        assert!(!amounts_within_tolerance(dec("-250"), dec("250"), dec("1.00"), dec("0.005")));
    }

    #[test]
    fn tolerance_overflow_is_not_within() {
        assert!(!amounts_within_tolerance(Decimal::MIN, Decimal::MAX, dec("1.00"), dec("0.005")));
        assert!(!amounts_within_tolerance(Decimal::MAX, Decimal::MIN, Decimal::MAX, dec("1")));
    }

    #[test]
    fn dates_within_window() {
        assert!(dates_within(date("2025-01-01"), date("2025-01-08"), 7));
        assert!(dates_within(date("2025-01-08"), date("2025-01-01"), 7));
        assert!(!dates_within(date("2025-01-10"), date("2025-01-01"), 7));
        assert!(dates_within(date("2025-01-01"), date("2025-01-01"), 0));
    }

    #[test]
    fn dates_absent_never_within() {
        assert!(!dates_within(None, date("2025-01-01"), 30));
        assert!(!dates_within(date("2025-01-01"), None, 30));
        assert!(!dates_within(None, None, 30));
    }

    #[test]
    fn offset_is_signed() {
        assert_eq!(date_offset(date("2025-01-10"), date("2025-01-01")), Some(9));
        assert_eq!(date_offset(date("2025-01-01"), date("2025-01-10")), Some(-9));
        assert_eq!(date_offset(None, date("2025-01-01")), None);
    }
}
