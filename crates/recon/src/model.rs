use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::MatchConfig;
use crate::error::ParseEnumError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A record exactly as the storage adapter handed it over.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// The only invoice shape the matching passes ever read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalInvoice {
    pub id: String,
    pub doc_number: String,
    /// Non-negative, at most [`crate::canonical::MAX_AMOUNT`].
    pub total_amount: Decimal,
    pub currency: String,
    pub invoice_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

/// One line of a statement of account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalStatementLine {
    pub id: String,
    pub doc_number: String,
    /// Magnitude at most [`crate::canonical::MAX_AMOUNT`].
    pub amount: Decimal,
    pub currency: String,
    pub date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// One statement line paired with one invoice.
///
/// Pass 5 group matches are expressed as several pairs sharing a `group_id`;
/// the single side of the group repeats across those pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPair {
    pub statement_line_id: String,
    pub invoice_id: String,
    pub pass_number: u8,
    pub rule_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Line-side total minus invoice-side total. Group pairs repeat the group's delta.
    pub amount_delta: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_offset_days: Option<i64>,
}

// ---------------------------------------------------------------------------
// Discrepancies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    AmountMismatch,
    DateMismatch,
    InvoiceNotFound,
    DuplicateInvoice,
    MissingSoaItem,
    CurrencyMismatch,
    Other,
}

impl DiscrepancyType {
    pub const ALL: [DiscrepancyType; 7] = [
        Self::AmountMismatch,
        Self::DateMismatch,
        Self::InvoiceNotFound,
        Self::DuplicateInvoice,
        Self::MissingSoaItem,
        Self::CurrencyMismatch,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmountMismatch => "amount_mismatch",
            Self::DateMismatch => "date_mismatch",
            Self::InvoiceNotFound => "invoice_not_found",
            Self::DuplicateInvoice => "duplicate_invoice",
            Self::MissingSoaItem => "missing_soa_item",
            Self::CurrencyMismatch => "currency_mismatch",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict: persistence adapters use this to refuse anything outside the enum.
impl FromStr for DiscrepancyType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "discrepancy type",
                value: s.to_string(),
            })
    }
}

/// Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseEnumError {
                kind: "severity",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DiscrepancyType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_statement_line_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_invoice_id: Option<String>,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total_lines: usize,
    pub total_invoices: usize,
    pub matched_lines: usize,
    pub matched_invoices: usize,
    pub unmatched_lines: usize,
    pub unmatched_invoices: usize,
    /// Match pair count keyed by pass number.
    pub matches_by_pass: BTreeMap<u8, usize>,
    pub discrepancies_by_type: BTreeMap<DiscrepancyType, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_severity: Option<Severity>,
}

impl ReconSummary {
    pub fn is_clean(&self) -> bool {
        self.unmatched_lines == 0 && self.unmatched_invoices == 0 && self.discrepancies_by_type.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub matches: Vec<MatchPair>,
    pub unmatched_lines: Vec<CanonicalStatementLine>,
    pub unmatched_invoices: Vec<CanonicalInvoice>,
    pub discrepancies: Vec<Discrepancy>,
    pub summary: ReconSummary,
    pub engine_version: String,
}

/// Inputs, config and outcome of one reconciliation, kept together for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationRun {
    pub statement_lines: Vec<CanonicalStatementLine>,
    pub invoice_candidates: Vec<CanonicalInvoice>,
    pub config: MatchConfig,
    pub result: ReconciliationResult,
}
