use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Discrepancy, MatchPair, ReconSummary};

/// Compute summary statistics for a finished run.
pub fn compute_summary(
    total_lines: usize,
    total_invoices: usize,
    matches: &[MatchPair],
    discrepancies: &[Discrepancy],
) -> ReconSummary {
    let matched_lines: BTreeSet<&str> = matches.iter().map(|m| m.statement_line_id.as_str()).collect();
    let matched_invoices: BTreeSet<&str> = matches.iter().map(|m| m.invoice_id.as_str()).collect();

    let mut matches_by_pass = BTreeMap::new();
    for m in matches {
        *matches_by_pass.entry(m.pass_number).or_insert(0) += 1;
    }

    let mut discrepancies_by_type = BTreeMap::new();
    for d in discrepancies {
        *discrepancies_by_type.entry(d.kind).or_insert(0) += 1;
    }

    ReconSummary {
        total_lines,
        total_invoices,
        matched_lines: matched_lines.len(),
        matched_invoices: matched_invoices.len(),
        unmatched_lines: total_lines - matched_lines.len(),
        unmatched_invoices: total_invoices - matched_invoices.len(),
        matches_by_pass,
        discrepancies_by_type,
        highest_severity: discrepancies.iter().map(|d| d.severity).max(),
    }
}
